//! Incremental "typing out" of an update: send a short first frame, then edit
//! the same message until it shows the full text.
//!
//! Frames are cut on line boundaries only. Every tag the formatter emits opens
//! and closes on one line, so each frame is valid Telegram HTML on its own.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::port::MessagingPort,
    Result,
};

/// Cumulative prefixes of `text`, growing by `lines_per_step` lines each.
///
/// The last frame is always `text` itself.
pub fn reveal_frames(text: &str, lines_per_step: usize) -> Vec<String> {
    let step = lines_per_step.max(1);
    let lines: Vec<&str> = text.split('\n').collect();

    let mut frames = Vec::with_capacity(lines.len().div_ceil(step));
    let mut end = step;
    while end < lines.len() {
        let frame = lines[..end].join("\n");
        // Blank trailing lines make identical-looking frames; skip them.
        if !frame.trim_end().is_empty() && frames.last() != Some(&frame) {
            frames.push(frame);
        }
        end += step;
    }
    frames.push(text.to_string());
    frames
}

#[derive(Clone, Copy, Debug)]
pub struct RevealConfig {
    pub lines_per_step: usize,
    /// Pause between edits. Zero disables the effect.
    pub delay: Duration,
}

impl RevealConfig {
    pub fn disabled() -> Self {
        Self {
            lines_per_step: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }
}

/// Send `html`, revealing it frame by frame when enabled and supported.
///
/// Edit failures stop the effect early but leave the message in place; the
/// caller still gets the message reference.
pub async fn send_revealed(
    messenger: &Arc<dyn MessagingPort>,
    chat_id: ChatId,
    html: &str,
    cfg: RevealConfig,
) -> Result<MessageRef> {
    if !cfg.is_enabled() || !messenger.capabilities().supports_edit {
        return messenger.send_html(chat_id, html).await;
    }

    let frames = reveal_frames(html, cfg.lines_per_step);
    let Some((first, rest)) = frames.split_first() else {
        return messenger.send_html(chat_id, html).await;
    };

    let msg = messenger.send_html(chat_id, first).await?;
    for frame in rest {
        sleep(cfg.delay).await;
        if let Err(e) = messenger.edit_html(msg, frame).await {
            tracing::debug!(chat_id = chat_id.0, error = %e, "reveal edit failed");
            break;
        }
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::{domain::MessageId, messaging::types::MessagingCapabilities};

    #[derive(Default)]
    struct Recorder {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl MessagingPort for Recorder {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities::TELEGRAM
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.calls.lock().unwrap().push(format!("send:{html}"));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn edit_html(&self, _msg: MessageRef, html: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("edit:{html}"));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_sends_then_edits_to_full_text() {
        let rec = Arc::new(Recorder::default());
        let messenger: Arc<dyn MessagingPort> = rec.clone();
        let cfg = RevealConfig {
            lines_per_step: 1,
            delay: Duration::from_millis(300),
        };

        send_revealed(&messenger, ChatId(1), "a\nb\nc", cfg)
            .await
            .unwrap();
        assert_eq!(
            *rec.calls.lock().unwrap(),
            vec!["send:a", "edit:a\nb", "edit:a\nb\nc"]
        );
    }

    #[tokio::test]
    async fn disabled_reveal_is_a_single_send() {
        let rec = Arc::new(Recorder::default());
        let messenger: Arc<dyn MessagingPort> = rec.clone();

        send_revealed(&messenger, ChatId(1), "a\nb", RevealConfig::disabled())
            .await
            .unwrap();
        assert_eq!(*rec.calls.lock().unwrap(), vec!["send:a\nb"]);
    }

    #[test]
    fn frames_grow_and_end_with_full_text() {
        let text = "a\nb\nc\nd\ne";
        let frames = reveal_frames(text, 2);
        assert_eq!(frames, vec!["a\nb", "a\nb\nc\nd", "a\nb\nc\nd\ne"]);
    }

    #[test]
    fn single_line_is_one_frame() {
        assert_eq!(reveal_frames("only", 3), vec!["only"]);
        assert_eq!(reveal_frames("x\ny", 0), vec!["x", "x\ny"]);
    }

    #[test]
    fn blank_only_prefixes_are_skipped() {
        let frames = reveal_frames("\n\nbody", 1);
        assert_eq!(frames, vec!["\n\nbody"]);
    }
}
