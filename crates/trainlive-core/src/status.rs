//! Train status port and the snapshot it produces.
//!
//! The HTTP implementation lives in the `trainlive-rail` adapter crate; the
//! poller and command handlers only see this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{domain::TrainNumber, errors::StatusError};

/// One stop on a train's route as reported upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct StationStop {
    pub code: String,
    pub name: String,
    pub platform: Option<String>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub departure_delay_secs: Option<i64>,
}

/// Point-in-time status of a train. Built per poll cycle and then dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub train_number: TrainNumber,
    pub current: StationStop,
    pub previous: Option<StationStop>,
    pub next: Option<StationStop>,
    pub distance_from_origin_km: Option<f64>,
    pub distance_from_last_station_km: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn current_station(&self) -> &str {
        &self.current.name
    }

    pub fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        self.current.scheduled_arrival
    }

    pub fn actual_time(&self) -> Option<DateTime<Utc>> {
        self.current.actual_arrival
    }

    pub fn previous_station(&self) -> Option<&str> {
        self.previous.as_ref().map(|s| s.name.as_str())
    }

    pub fn next_station(&self) -> Option<&str> {
        self.next.as_ref().map(|s| s.name.as_str())
    }
}

/// Port for looking up a train's live position.
///
/// One call is one upstream attempt; retrying is the caller's decision.
#[async_trait]
pub trait TrainStatusClient: Send + Sync {
    async fn fetch(&self, train: &TrainNumber) -> Result<StatusSnapshot, StatusError>;
}
