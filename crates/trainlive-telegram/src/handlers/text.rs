use std::sync::Arc;

use teloxide::prelude::*;

use trainlive_core::domain::ChatId;

use crate::router::AppState;

const HINT: &str = "Send /addtrain &lt;train_no&gt; to track a train";

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Service messages (joins, pins, ...) carry no text; stay quiet on those.
    if msg.text().is_none() && msg.caption().is_none() {
        return Ok(());
    }

    if let Err(e) = state.messenger.send_html(ChatId(msg.chat.id.0), HINT).await {
        tracing::warn!(chat_id = msg.chat.id.0, error = %e, "failed to send hint");
    }
    Ok(())
}
