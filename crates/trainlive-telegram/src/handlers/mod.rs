//! Telegram update handlers.
//!
//! Commands go to `commands` (serialized per chat); any other text gets the
//! usage hint from `text`.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            let _guard = state.chat_locks.lock_chat(chat_id).await;
            return commands::handle_command(msg, state).await;
        }
    }

    text::handle_text(msg, state).await
}
