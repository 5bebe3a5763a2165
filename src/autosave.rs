//! Background autosave.
//!
//! A recovery side channel, never part of the undoable sequence: on a fixed
//! interval the scheduler fingerprints the timeline's current entry and, if
//! it changed since the last flush, persists a derived autosave copy without
//! touching the in-memory timeline, cursor, or version numbering.
//!
//! Ticks never overlap (the loop awaits each flush before the next tick) and
//! never race `dispose()`: the timer is cancelled and joined before the final
//! flush runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{codec, entry, ActionType, PersistedHistoryStore, SharedTimeline};

/// Default autosave interval.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// What the scheduler remembers about its last successful flush.
#[derive(Debug, Default, Clone, Copy)]
struct LastFlush {
    fingerprint: Option<u64>,
    entry_id: Option<Uuid>,
    source_version: Option<u64>,
}

struct AutosaveShared {
    timeline: SharedTimeline,
    store: Arc<dyn PersistedHistoryStore>,
    last: Mutex<LastFlush>,
}

impl AutosaveShared {
    /// One autosave pass: skip if the current state's fingerprint matches
    /// the last flush, otherwise persist a derived copy.
    async fn flush_if_changed(&self) {
        let current = {
            let timeline = self
                .timeline
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            timeline.current_entry().cloned()
        };
        let Some(current) = current else {
            return;
        };

        let fingerprint = codec::fingerprint(&current.canvas_state);
        let reuse_id = {
            let last = self
                .last
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if last.fingerprint == Some(fingerprint) {
                tracing::debug!("autosave: state unchanged, skipping");
                return;
            }
            // Re-flushing the same source version amends the previous
            // autosave entry via the store's idempotent upsert.
            if last.source_version == Some(current.version_number) {
                last.entry_id
            } else {
                None
            }
        };

        let mut autosave = current.clone();
        autosave.id = reuse_id.unwrap_or_else(Uuid::new_v4);
        autosave.action_type = ActionType::Autosave;
        autosave.action_label = format!("Autosave {}", entry::now_ms());
        autosave.is_autosave = true;
        autosave.is_checkpoint = false;
        autosave.thumbnail_url = None;
        autosave.created_at = entry::now_ms();

        if let Err(e) = self.store.upsert(&autosave).await {
            // Logged, not retried synchronously; the next tick tries again.
            tracing::warn!("autosave persist failed: {e}");
            return;
        }

        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = LastFlush {
            fingerprint: Some(fingerprint),
            entry_id: Some(autosave.id),
            source_version: Some(current.version_number),
        };
        tracing::debug!(version = current.version_number, "autosaved current state");
    }
}

/// Periodically persists the current entry as a non-destructive autosave.
pub struct AutosaveScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    shared: Arc<AutosaveShared>,
}

impl AutosaveScheduler {
    /// Start the scheduler over a shared timeline and store.
    #[must_use]
    pub fn start(
        timeline: SharedTimeline,
        store: Arc<dyn PersistedHistoryStore>,
        interval: Duration,
    ) -> Self {
        let shared = Arc::new(AutosaveShared {
            timeline,
            store,
            last: Mutex::new(LastFlush::default()),
        });
        let (shutdown, mut rx) = watch::channel(false);

        let task_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately; the
            // session just opened, so there is nothing worth saving yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => task_shared.flush_if_changed().await,
                    _ = rx.changed() => break,
                }
            }
        });

        Self {
            shutdown,
            handle,
            shared,
        }
    }

    /// Stop the timer, then run one final flush if state changed since the
    /// last tick. The timer task is joined before the flush so no tick can
    /// race it.
    pub async fn dispose(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
        self.shared.flush_if_changed().await;
        tracing::info!("autosave scheduler stopped");
    }
}
