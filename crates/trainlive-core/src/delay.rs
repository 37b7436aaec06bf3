use std::fmt;

use chrono::{DateTime, Utc};

/// Lateness of a train at a station, in whole minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    OnTime,
    Late { hours: u32, minutes: u32 },
}

impl Delay {
    /// Delay of `actual` relative to `scheduled`.
    ///
    /// Returns `None` when either time is unknown: an unknown delay is not
    /// reported rather than shown as on time. Early arrivals count as on time.
    pub fn between(
        scheduled: Option<DateTime<Utc>>,
        actual: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let (scheduled, actual) = (scheduled?, actual?);
        Some(Self::from_late_secs(
            actual.signed_duration_since(scheduled).num_seconds(),
        ))
    }

    /// Build from an upstream "delay in seconds" field.
    pub fn from_secs(secs: Option<i64>) -> Option<Self> {
        secs.map(Self::from_late_secs)
    }

    fn from_late_secs(secs: i64) -> Self {
        let total_minutes = secs.max(0) / 60;
        if total_minutes == 0 {
            return Delay::OnTime;
        }
        Delay::Late {
            hours: u32::try_from(total_minutes / 60).unwrap_or(u32::MAX),
            minutes: (total_minutes % 60) as u32,
        }
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Delay::OnTime => f.write_str("on time"),
            Delay::Late { hours: 0, minutes } => write!(f, "{minutes}m late"),
            Delay::Late { hours, minutes } => write!(f, "{hours}h {minutes}m late"),
        }
    }
}
