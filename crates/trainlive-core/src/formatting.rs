//! Formatting utilities (train status → Telegram HTML).

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    delay::Delay,
    registry::TrackedTrain,
    status::{StationStop, StatusSnapshot},
};

const NOT_AVAILABLE: &str = "N/A";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Clone, Copy, Debug)]
pub struct FormatOptions {
    /// Offset used to display wall-clock times.
    pub utc_offset: FixedOffset,
}

impl FormatOptions {
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let utc_offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(ist);
        Self { utc_offset }
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { utc_offset: ist() }
    }
}

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is within +/-24h")
}

/// 12-hour clock time (`02:05 PM`), or `N/A` when unknown.
pub fn format_time_12h(ts: Option<DateTime<Utc>>, opts: &FormatOptions) -> String {
    match ts {
        Some(ts) => ts
            .with_timezone(&opts.utc_offset)
            .format("%I:%M %p")
            .to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn format_delay(delay: Option<Delay>) -> String {
    delay
        .map(|d| d.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn stop_delay(stop: &StationStop) -> Option<Delay> {
    Delay::from_secs(stop.departure_delay_secs)
        .or_else(|| Delay::between(stop.scheduled_arrival, stop.actual_arrival))
}

fn platform(stop: &StationStop) -> String {
    stop.platform
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(escape_html)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Render one status update.
///
/// Pure: identical snapshot + options always yield the identical string, so
/// presentation effects (see `messaging::reveal`) can be layered on top.
pub fn render_update(snapshot: &StatusSnapshot, opts: &FormatOptions) -> String {
    let cur = &snapshot.current;
    let delay = Delay::between(snapshot.scheduled_time(), snapshot.actual_time())
        .or_else(|| Delay::from_secs(cur.departure_delay_secs));

    let mut out = format!(
        "🚆 <b>Train {}</b>\n\
📍 Current Station: <b>{}</b>\n\
🕒 Scheduled: {}\n\
🕓 Actual: {}\n\
⏱️ Delay: {}\n",
        escape_html(snapshot.train_number.as_str()),
        escape_html(&cur.name),
        format_time_12h(snapshot.scheduled_time(), opts),
        format_time_12h(snapshot.actual_time(), opts),
        format_delay(delay),
    );

    if let Some(km) = snapshot.distance_from_origin_km {
        out.push_str(&format!("📏 Distance covered: <b>{km:.1} km</b>"));
        if let Some(last) = snapshot.distance_from_last_station_km {
            out.push_str(&format!(" ({last:.1} km past last station)"));
        }
        out.push('\n');
    }

    if let Some(prev) = &snapshot.previous {
        out.push_str(&format!(
            "\n⬅️ <b>Previous Station</b>\n\
🏁 {}\n\
🚉 Platform: {}\n\
🕒 Chart Timing: {}\n\
🕓 Actual Arrived: {}\n\
⏱️ Delay: {}\n",
            escape_html(&prev.name),
            platform(prev),
            format_time_12h(prev.scheduled_arrival, opts),
            format_time_12h(prev.actual_arrival, opts),
            format_delay(stop_delay(prev)),
        ));
    }

    if let Some(next) = &snapshot.next {
        out.push_str(&format!(
            "\n➡️ <b>Next Station</b>\n\
🚉 {}\n\
🚉 Platform: {}\n\
🕒 Chart Timing: {}\n\
🕓 Expected Timing: {}\n\
⏱️ Delay: {}\n",
            escape_html(&next.name),
            platform(next),
            format_time_12h(next.scheduled_arrival, opts),
            format_time_12h(next.actual_arrival, opts),
            format_delay(stop_delay(next)),
        ));
    }

    out.push_str(&format!(
        "\n<i>Updated {}</i>",
        format_time_12h(Some(snapshot.fetched_at), opts)
    ));
    out
}

/// `/status` body for a chat.
pub fn render_tracking_list(trains: &[TrackedTrain]) -> String {
    if trains.is_empty() {
        return "❌ No active train".to_string();
    }

    let mut lines = vec![format!("✅ <b>Tracking {} train(s)</b>", trains.len())];
    for t in trains {
        let station = t
            .last_known_station
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "<i>waiting for first update</i>".to_string());
        lines.push(format!(
            "• <code>{}</code>: {}",
            escape_html(t.train_number.as_str()),
            station
        ));
    }
    lines.join("\n")
}
