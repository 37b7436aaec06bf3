use std::sync::Arc;

use teloxide::prelude::*;

use trainlive_core::{
    domain::{ChatId, TrainNumber},
    formatting::{escape_html, render_tracking_list, render_update},
    messaging::port::MessagingPort,
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// First whitespace-separated token of a command argument, if any.
fn first_arg(arg: &str) -> Option<&str> {
    arg.split_whitespace().next()
}

fn help_text(first_name: Option<&str>) -> String {
    let name = first_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("there");
    format!(
        "👋 <b>Hello {}!</b>\n\n\
🚆 <b>Train Live Bot</b>\n\n\
▶️ /addtrain &lt;train_no&gt; - Track a train\n\
📊 /status - Show tracked trains\n\
🛑 /removetrain [train_no] - Stop tracking (all trains if no number)\n\n\
You get a message whenever a tracked train reaches a new station.",
        escape_html(name)
    )
}

async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
    }
}

/// Execute a command and return the HTML reply.
async fn run_command(
    state: &AppState,
    chat_id: ChatId,
    first_name: Option<&str>,
    text: &str,
) -> String {
    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => help_text(first_name),

        "status" => render_tracking_list(&state.poller.registry().list(chat_id)),

        "addtrain" => {
            let Some(raw) = first_arg(&arg) else {
                return "Usage: <code>/addtrain 12303</code>".to_string();
            };
            let train = match TrainNumber::parse(raw) {
                Ok(t) => t,
                Err(e) => return format!("❌ {}", escape_html(&e.user_message())),
            };

            match state.poller.start_tracking(chat_id, train).await {
                Ok(started) => {
                    let header = format!(
                        "🚆 Tracking Train <b>{}</b>",
                        escape_html(started.entry.train_number.as_str())
                    );
                    match started.initial {
                        Ok(snapshot) => format!(
                            "{header}\n\n{}",
                            render_update(&snapshot, state.poller.format_options())
                        ),
                        Err(e) => format!(
                            "{header}\n\n⚠️ {}. Updates will follow once it responds.",
                            escape_html(&trainlive_core::Error::from(e).user_message())
                        ),
                    }
                }
                Err(e) => format!("❌ {}", escape_html(&e.user_message())),
            }
        }

        "removetrain" => {
            let train = match first_arg(&arg).map(TrainNumber::parse).transpose() {
                Ok(t) => t,
                Err(e) => return format!("❌ {}", escape_html(&e.user_message())),
            };

            match state.poller.stop_tracking(chat_id, train.as_ref()).await {
                Ok(removed) => {
                    let list = removed
                        .iter()
                        .map(|t| format!("<code>{}</code>", escape_html(t.train_number.as_str())))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("🗑️ Tracking stopped: {list}")
                }
                Err(e) => format!("❌ {}", escape_html(&e.user_message())),
            }
        }

        _ => format!("Unknown command: /{}", escape_html(&cmd)),
    }
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat_id = ChatId(msg.chat.id.0);
    let first_name = msg.from().map(|u| u.first_name.as_str());

    tracing::debug!(chat_id = chat_id.0, command = %text, "command");
    let html = run_command(&state, chat_id, first_name, text).await;
    reply(&state, chat_id, &html).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use trainlive_core::{
        config::Config,
        domain::{MessageId, MessageRef},
        errors::StatusError,
        messaging::types::MessagingCapabilities,
        poller::{PollerConfig, TrainPoller},
        registry::TrackingRegistry,
        status::{StationStop, StatusSnapshot, TrainStatusClient},
        Result,
    };

    use crate::router::ChatLocks;

    /// Knows train 12303 (at Gaya Jn); 99999 does not exist; 55555 is down.
    struct FixedClient;

    #[async_trait]
    impl TrainStatusClient for FixedClient {
        async fn fetch(
            &self,
            train: &TrainNumber,
        ) -> std::result::Result<StatusSnapshot, StatusError> {
            match train.as_str() {
                "99999" => Err(StatusError::NotFound(train.clone())),
                "55555" => Err(StatusError::UpstreamUnavailable("503".to_string())),
                _ => Ok(StatusSnapshot {
                    train_number: train.clone(),
                    current: StationStop {
                        code: "GAYA".to_string(),
                        name: "Gaya Jn".to_string(),
                        platform: None,
                        scheduled_arrival: None,
                        actual_arrival: None,
                        departure_delay_secs: None,
                    },
                    previous: None,
                    next: None,
                    distance_from_origin_km: None,
                    distance_from_last_station_km: None,
                    fetched_at: chrono::Utc::now(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct NullMessenger {
        sends: StdMutex<usize>,
    }

    #[async_trait]
    impl MessagingPort for NullMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities::TELEGRAM
        }

        async fn send_html(&self, chat_id: ChatId, _html: &str) -> Result<MessageRef> {
            let mut n = self.sends.lock().unwrap();
            *n += 1;
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(*n as i32),
            })
        }

        async fn edit_html(&self, _msg: MessageRef, _html: &str) -> Result<()> {
            Ok(())
        }
    }

    fn state() -> AppState {
        let cfg =
            Config::from_lookup(|k| (k == "TELEGRAM_BOT_TOKEN").then(|| "t".to_string())).unwrap();
        let messenger: Arc<dyn MessagingPort> = Arc::new(NullMessenger::default());
        let poller = TrainPoller::new(
            PollerConfig::from_config(&cfg),
            Arc::new(TrackingRegistry::new(cfg.max_trains_per_chat)),
            Arc::new(FixedClient),
            messenger.clone(),
        );
        AppState {
            poller,
            messenger,
            chat_locks: Arc::new(ChatLocks::default()),
        }
    }

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/AddTrain@train_live_bot  12303 extra"),
            ("addtrain".to_string(), "12303 extra".to_string())
        );
        assert_eq!(
            parse_command("/status"),
            ("status".to_string(), String::new())
        );
        assert_eq!(first_arg("  12303 x"), Some("12303"));
        assert_eq!(first_arg("   "), None);
    }

    #[test]
    fn help_greets_and_lists_commands() {
        let h = help_text(Some("Asha <3"));
        assert!(h.contains("Hello Asha &lt;3!"));
        for cmd in ["/addtrain", "/status", "/removetrain"] {
            assert!(h.contains(cmd));
        }
        assert!(help_text(None).contains("Hello there!"));
    }

    #[tokio::test]
    async fn add_status_remove_flow() {
        let st = state();
        let chat = ChatId(42);

        let r = run_command(&st, chat, None, "/status").await;
        assert_eq!(r, "❌ No active train");

        let r = run_command(&st, chat, None, "/addtrain 12303").await;
        assert!(r.starts_with("🚆 Tracking Train <b>12303</b>"), "{r}");
        assert!(r.contains("Gaya Jn"));

        let r = run_command(&st, chat, None, "/addtrain 12303").await;
        assert_eq!(r, "❌ Already tracking train 12303");

        let r = run_command(&st, chat, None, "/status").await;
        assert!(r.contains("<code>12303</code>: Gaya Jn"), "{r}");

        let r = run_command(&st, chat, None, "/removetrain").await;
        assert_eq!(r, "🗑️ Tracking stopped: <code>12303</code>");

        let r = run_command(&st, chat, None, "/removetrain").await;
        assert_eq!(r, "❌ No active train");
        st.poller.shutdown().await;
    }

    #[tokio::test]
    async fn add_reports_bad_input_and_unknown_trains() {
        let st = state();
        let chat = ChatId(1);

        assert!(run_command(&st, chat, None, "/addtrain").await.contains("Usage"));
        assert_eq!(
            run_command(&st, chat, None, "/addtrain abc").await,
            "❌ &quot;abc&quot; is not a valid train number"
        );
        assert_eq!(
            run_command(&st, chat, None, "/addtrain 99999").await,
            "❌ Train 99999 was not found"
        );
        assert!(st.poller.registry().list(chat).is_empty());
    }

    #[tokio::test]
    async fn add_keeps_tracking_when_upstream_is_down() {
        let st = state();
        let chat = ChatId(1);

        let r = run_command(&st, chat, None, "/addtrain 55555").await;
        assert!(r.contains("Updates will follow"), "{r}");
        assert_eq!(st.poller.registry().list(chat).len(), 1);
        st.poller.shutdown().await;
    }

    #[tokio::test]
    async fn remove_specific_untracked_train() {
        let st = state();
        let r = run_command(&st, ChatId(1), None, "/removetrain 12303").await;
        assert_eq!(r, "❌ Train 12303 is not being tracked");

        let r = run_command(&st, ChatId(1), None, "/removetrain 12x").await;
        assert_eq!(r, "❌ &quot;12x&quot; is not a valid train number");
    }

    #[tokio::test]
    async fn unknown_command() {
        let st = state();
        assert_eq!(
            run_command(&st, ChatId(1), None, "/fly").await,
            "Unknown command: /fly"
        );
    }
}
