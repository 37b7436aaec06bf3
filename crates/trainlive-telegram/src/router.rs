use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use teloxide::{
    dispatching::Dispatcher,
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::{webhooks, UpdateListener},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use trainlive_core::{
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    poller::{PollerConfig, TrainPoller},
    registry::TrackingRegistry,
    status::TrainStatusClient,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub poller: TrainPoller,
    pub messenger: Arc<dyn MessagingPort>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat command serialization: two `/addtrain` from the same chat never
/// interleave their register/lookup/reply steps.
///
/// A chat's lock is dropped from the table once nobody holds or waits on it.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Only the map itself references an idle lock.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

const WEBHOOK_PATH: &str = "/webhook";

/// Full webhook URL Telegram posts updates to.
fn webhook_endpoint(base: &str) -> anyhow::Result<reqwest::Url> {
    let url = format!("{}{WEBHOOK_PATH}", base.trim_end_matches('/'));
    reqwest::Url::parse(&url).map_err(|e| anyhow::anyhow!("invalid WEBHOOK_URL {url:?}: {e}"))
}

async fn health() -> &'static str {
    "Train live bot is running"
}

/// Run the bot until ctrl-c: webhook server when `WEBHOOK_URL` is set,
/// long polling otherwise.
pub async fn run_bot(
    cfg: Arc<Config>,
    client: Arc<dyn TrainStatusClient>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    match bot.get_me().await {
        Ok(me) => tracing::info!("trainlive started: @{}", me.username()),
        Err(e) => tracing::warn!(error = %e, "getMe failed; continuing"),
    }
    tracing::info!(
        api = %cfg.train_api_url,
        interval_secs = cfg.poll_interval.as_secs(),
        max_per_chat = cfg.max_trains_per_chat,
        "polling configuration"
    );

    // Many trains can move within one poll window; pace the sends. The
    // Telegram adapter still retries once on 429 RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let registry = Arc::new(TrackingRegistry::new(cfg.max_trains_per_chat));
    let poller = TrainPoller::new(
        PollerConfig::from_config(&cfg),
        registry,
        client,
        messenger.clone(),
    );

    let state = Arc::new(AppState {
        poller: poller.clone(),
        messenger,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match cfg.webhook_url.as_deref() {
        Some(base) => {
            let url = webhook_endpoint(base)?;
            let address = SocketAddr::from(([0, 0, 0, 0], cfg.port));
            tracing::info!(%url, %address, "receiving updates via webhook");

            let options = webhooks::Options::new(address, url);
            let (mut listener, stop_flag, webhook_app) =
                webhooks::axum_to_router(bot, options).await?;
            let app: Router = webhook_app.route("/", get(health));

            let stop_token = listener.stop_token();
            tokio::spawn(async move {
                let served = axum::Server::bind(&address)
                    .serve(app.into_make_service())
                    .with_graceful_shutdown(stop_flag)
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "webhook server failed");
                    stop_token.stop();
                }
            });

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook listener error"),
                )
                .await;
        }
        None => {
            tracing::info!("receiving updates via long polling");
            dispatcher.dispatch().await;
        }
    }

    tracing::info!("dispatcher stopped, cancelling poll loops");
    poller.shutdown().await;

    Ok(())
}
