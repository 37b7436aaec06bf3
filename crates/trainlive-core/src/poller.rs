//! Per-train polling loop.
//!
//! Every tracked train gets its own tokio task:
//! - sleeps `first_poll_delay`, then `poll_interval` between cycles
//! - fetches a snapshot (at most `max_concurrent_fetches` fetches in flight overall)
//! - compares the current station code with the registry's last known one
//! - sends a formatted update when the station changed, or when this is the
//!   first status the chat gets (the `/addtrain` lookup failed)
//!
//! Fetch failures are logged and the entry stays tracked for the next cycle.
//! Removing an entry cancels its task; a fetch already in flight completes but
//! cannot notify because the registry no longer knows the entry.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    domain::{ChatId, TrainNumber},
    errors::{StatusError, TrackingError},
    formatting::{render_update, FormatOptions},
    messaging::{
        port::MessagingPort,
        reveal::{send_revealed, RevealConfig},
    },
    registry::{StationObservation, TrackedTrain, TrackingId, TrackingRegistry},
    status::{StatusSnapshot, TrainStatusClient},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub first_poll_delay: Duration,
    pub max_concurrent_fetches: usize,
    pub format: FormatOptions,
    pub reveal: RevealConfig,
}

impl PollerConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            first_poll_delay: cfg.first_poll_delay,
            max_concurrent_fetches: cfg.max_concurrent_fetches,
            format: FormatOptions::with_offset_minutes(cfg.utc_offset_minutes),
            reveal: RevealConfig {
                lines_per_step: cfg.reveal_lines_per_step,
                delay: cfg.reveal_delay,
            },
        }
    }
}

/// What one poll cycle did.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// The entry is gone from the registry; the loop should stop.
    Dropped,
    /// Fetch failed; nothing changed and the next cycle will retry.
    Failed(StatusError),
    /// First station seen by the loop. Happens only when the `/addtrain`
    /// lookup failed, so the chat has not seen a status yet and gets one.
    Baseline { station: String, delivered: bool },
    NoChange,
    /// Station changed and was recorded. `delivered` is false when the
    /// messenger failed to send the update.
    Notified {
        previous: String,
        station: String,
        delivered: bool,
    },
}

/// Result of `/addtrain`: the registered entry plus the first lookup.
#[derive(Clone, Debug)]
pub struct TrackingStarted {
    pub entry: TrackedTrain,
    pub initial: std::result::Result<StatusSnapshot, StatusError>,
}

#[derive(Clone)]
pub struct TrainPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    cfg: PollerConfig,
    registry: Arc<TrackingRegistry>,
    client: Arc<dyn TrainStatusClient>,
    messenger: Arc<dyn MessagingPort>,
    fetch_permits: Semaphore,
    jobs: Mutex<HashMap<TrackingId, JobEntry>>,
}

struct JobEntry {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrainPoller {
    pub fn new(
        cfg: PollerConfig,
        registry: Arc<TrackingRegistry>,
        client: Arc<dyn TrainStatusClient>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                fetch_permits: Semaphore::new(cfg.max_concurrent_fetches.max(1)),
                cfg,
                registry,
                client,
                messenger,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<TrackingRegistry> {
        &self.inner.registry
    }

    pub fn format_options(&self) -> &FormatOptions {
        &self.inner.cfg.format
    }

    /// Register `train` for `chat_id`, look it up once, and start its loop.
    ///
    /// An unknown train is rolled back and reported as an error. Other lookup
    /// failures keep the registration without a baseline; the loop sends the
    /// first status it manages to fetch.
    pub async fn start_tracking(
        &self,
        chat_id: ChatId,
        train: TrainNumber,
    ) -> Result<TrackingStarted> {
        let registry = &self.inner.registry;
        let entry = registry.add(chat_id, train)?;

        let initial = self.fetch(&entry.train_number).await;
        match &initial {
            Err(e @ StatusError::NotFound(_)) => {
                registry.remove_id(entry.id);
                info!(chat_id = chat_id.0, train = %entry.train_number, "unknown train, not tracking");
                return Err(e.clone().into());
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, train = %entry.train_number, error = %e, "initial lookup failed, tracking anyway");
            }
            Ok(snapshot) => {
                registry.observe_station(entry.id, &snapshot.current);
            }
        }

        // A concurrent /removetrain may already have dropped it.
        let Some(entry) = registry.get(entry.id) else {
            return Err(TrackingError::NotTracking(Some(entry.train_number)).into());
        };

        self.track(&entry).await;
        info!(chat_id = chat_id.0, train = %entry.train_number, id = entry.id.0, "tracking started");
        Ok(TrackingStarted { entry, initial })
    }

    /// Remove one (`Some`) or all (`None`) of a chat's trains and stop their loops.
    pub async fn stop_tracking(
        &self,
        chat_id: ChatId,
        train: Option<&TrainNumber>,
    ) -> Result<Vec<TrackedTrain>> {
        let removed = self.inner.registry.remove(chat_id, train)?;
        for entry in &removed {
            self.untrack(entry.id).await;
            info!(chat_id = chat_id.0, train = %entry.train_number, id = entry.id.0, "tracking stopped");
        }
        Ok(removed)
    }

    /// Spawn the poll loop for an entry already in the registry.
    pub async fn track(&self, entry: &TrackedTrain) {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let id = entry.id;
        let cancel_clone = cancel.clone();

        // Hold the map while spawning so a loop that exits immediately cannot
        // run its cleanup before its own entry is inserted.
        let mut jobs = self.inner.jobs.lock().await;
        let handle = tokio::spawn(async move {
            poller.job_loop(id, cancel_clone).await;
        });
        if let Some(old) = jobs.insert(id, JobEntry { cancel, handle }) {
            old.cancel.cancel();
        }
    }

    /// Stop the loop for `id`. Advisory: an in-flight fetch still completes.
    pub async fn untrack(&self, id: TrackingId) {
        if let Some(job) = self.inner.jobs.lock().await.remove(&id) {
            job.cancel.cancel();
        }
    }

    pub async fn active_jobs(&self) -> usize {
        self.inner.jobs.lock().await.len()
    }

    pub async fn shutdown(&self) {
        let mut jobs = self.inner.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.cancel.cancel();
            job.handle.abort();
        }
    }

    async fn job_loop(&self, id: TrackingId, cancel: CancellationToken) {
        let mut wait = self.inner.cfg.first_poll_delay;
        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(wait) => {}
            }
            wait = self.inner.cfg.poll_interval;

            let Some(entry) = self.inner.registry.get(id) else {
                break;
            };
            if self.poll_once(&entry).await == PollOutcome::Dropped {
                break;
            }
        }

        // Cancelled jobs were already removed by `untrack`/`shutdown`.
        if !self.inner.registry.contains(id) {
            self.inner.jobs.lock().await.remove(&id);
        }
        debug!(id = id.0, "poll loop exited");
    }

    /// One fetch → compare → notify cycle for `entry`.
    pub async fn poll_once(&self, entry: &TrackedTrain) -> PollOutcome {
        let snapshot = match self.fetch(&entry.train_number).await {
            Ok(s) => s,
            Err(e) => {
                if !self.inner.registry.contains(entry.id) {
                    return PollOutcome::Dropped;
                }
                if e.is_transient() {
                    warn!(chat_id = entry.chat_id.0, train = %entry.train_number, error = %e, "poll skipped");
                } else {
                    warn!(chat_id = entry.chat_id.0, train = %entry.train_number, error = %e, "train no longer reported upstream, keeping it tracked");
                }
                return PollOutcome::Failed(e);
            }
        };

        let station = snapshot.current_station().to_string();
        match self.inner.registry.observe_station(entry.id, &snapshot.current) {
            StationObservation::Untracked => PollOutcome::Dropped,
            StationObservation::Unchanged => {
                debug!(train = %entry.train_number, %station, "no change");
                PollOutcome::NoChange
            }
            StationObservation::Baseline => {
                let delivered = self.deliver(entry, &snapshot).await;
                info!(chat_id = entry.chat_id.0, train = %entry.train_number, %station, "first status delivered late");
                PollOutcome::Baseline { station, delivered }
            }
            StationObservation::Changed { previous } => {
                let delivered = self.deliver(entry, &snapshot).await;
                info!(chat_id = entry.chat_id.0, train = %entry.train_number, from = %previous, to = %station, "station changed");
                PollOutcome::Notified {
                    previous,
                    station,
                    delivered,
                }
            }
        }
    }

    /// Render and send `snapshot` to the entry's chat. False if sending failed.
    async fn deliver(&self, entry: &TrackedTrain, snapshot: &StatusSnapshot) -> bool {
        let html = render_update(snapshot, &self.inner.cfg.format);
        match send_revealed(
            &self.inner.messenger,
            entry.chat_id,
            &html,
            self.inner.cfg.reveal,
        )
        .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(chat_id = entry.chat_id.0, train = %entry.train_number, error = %e, "failed to deliver update");
                false
            }
        }
    }

    async fn fetch(&self, train: &TrainNumber) -> std::result::Result<StatusSnapshot, StatusError> {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self
            .inner
            .fetch_permits
            .acquire()
            .await
            .map_err(|e| StatusError::UpstreamUnavailable(format!("fetch limiter closed: {e}")))?;
        self.inner.client.fetch(train).await
    }
}
