//! In-memory tracking registry: which chat follows which train.
//!
//! Owned by the composition root and shared via `Arc`. Command handlers add
//! and remove entries; poll tasks record the last station they saw. One mutex
//! serializes both, so a compare-and-update never races a removal.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, TrainNumber},
    errors::TrackingError,
    status::StationStop,
};

/// Process-unique id of one tracking registration.
///
/// Removing and re-adding the same (chat, train) pair yields a new id, so a
/// stale poll task can never touch the newer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedTrain {
    pub id: TrackingId,
    pub chat_id: ChatId,
    pub train_number: TrainNumber,
    /// Display name of the last station seen, for `/status`.
    pub last_known_station: Option<String>,
    /// Station code of the last station seen. Change detection keys on this.
    pub last_station_code: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Result of comparing a freshly fetched station against the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StationObservation {
    /// No station was known yet; this one is now recorded.
    Baseline,
    /// The station moved; the new one is recorded.
    Changed { previous: String },
    Unchanged,
    /// The entry was removed while the fetch was in flight.
    Untracked,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    entries: HashMap<TrackingId, TrackedTrain>,
}

pub struct TrackingRegistry {
    max_per_chat: usize,
    state: Mutex<RegistryState>,
}

impl TrackingRegistry {
    pub fn new(max_per_chat: usize) -> Self {
        Self {
            max_per_chat: max_per_chat.max(1),
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Registry state stays consistent across a panicking holder (every
        // mutation is a single insert/remove/assign).
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, chat_id: ChatId, train: TrainNumber) -> Result<TrackedTrain, TrackingError> {
        let mut st = self.lock();

        let mut count = 0usize;
        for e in st.entries.values().filter(|e| e.chat_id == chat_id) {
            if e.train_number == train {
                return Err(TrackingError::AlreadyTracking(train));
            }
            count += 1;
        }
        if count >= self.max_per_chat {
            return Err(TrackingError::LimitReached {
                limit: self.max_per_chat,
            });
        }

        st.next_id += 1;
        let entry = TrackedTrain {
            id: TrackingId(st.next_id),
            chat_id,
            train_number: train,
            last_known_station: None,
            last_station_code: None,
            added_at: Utc::now(),
        };
        st.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Remove one train (`Some`) or every train (`None`) tracked by a chat.
    pub fn remove(
        &self,
        chat_id: ChatId,
        train: Option<&TrainNumber>,
    ) -> Result<Vec<TrackedTrain>, TrackingError> {
        let mut st = self.lock();

        let ids: Vec<TrackingId> = st
            .entries
            .values()
            .filter(|e| e.chat_id == chat_id)
            .filter(|e| train.map(|t| &e.train_number == t).unwrap_or(true))
            .map(|e| e.id)
            .collect();

        if ids.is_empty() {
            return Err(TrackingError::NotTracking(train.cloned()));
        }

        let mut removed: Vec<TrackedTrain> = ids
            .into_iter()
            .filter_map(|id| st.entries.remove(&id))
            .collect();
        removed.sort_by_key(|e| e.id);
        Ok(removed)
    }

    /// Remove a single registration by id. Returns it if it was still present.
    pub fn remove_id(&self, id: TrackingId) -> Option<TrackedTrain> {
        self.lock().entries.remove(&id)
    }

    /// Snapshot of a chat's tracked trains, oldest first.
    pub fn list(&self, chat_id: ChatId) -> Vec<TrackedTrain> {
        let st = self.lock();
        let mut out: Vec<TrackedTrain> = st
            .entries
            .values()
            .filter(|e| e.chat_id == chat_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.id);
        out
    }

    pub fn get(&self, id: TrackingId) -> Option<TrackedTrain> {
        self.lock().entries.get(&id).cloned()
    }

    pub fn contains(&self, id: TrackingId) -> bool {
        self.lock().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compare `stop` with the last known station and record it.
    ///
    /// Stations are identified by code; a new display name for the same code
    /// is recorded as `Unchanged`.
    pub fn observe_station(&self, id: TrackingId, stop: &StationStop) -> StationObservation {
        let mut st = self.lock();
        let Some(entry) = st.entries.get_mut(&id) else {
            return StationObservation::Untracked;
        };

        let code = station_key(stop);
        let previous_code = entry.last_station_code.replace(code.to_string());
        let previous_name = entry.last_known_station.replace(stop.name.clone());

        match previous_code {
            None => StationObservation::Baseline,
            Some(prev) if prev == code => StationObservation::Unchanged,
            Some(prev) => StationObservation::Changed {
                previous: previous_name.unwrap_or(prev),
            },
        }
    }
}

fn station_key(stop: &StationStop) -> &str {
    let code = stop.code.trim();
    if code.is_empty() {
        stop.name.trim()
    } else {
        code
    }
}

impl std::fmt::Debug for TrackingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingRegistry")
            .field("max_per_chat", &self.max_per_chat)
            .field("entries", &self.len())
            .finish()
    }
}
