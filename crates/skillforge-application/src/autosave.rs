//! Debounced pending-session snapshots.
//!
//! Wraps a [`PendingSessionStore`] as a stream observer: the first
//! progress tick seeds the draft with the request fields (description,
//! answers, config values), later ticks write only `{spec, is_complete}`
//! patches at most once per debounce window. The final settle snapshot
//! always flushes. Store failures are logged and swallowed; the buffer is
//! a best-effort cache and must never fail a generation turn.

use crate::engine::{StreamObserver, StreamSnapshot};
use async_trait::async_trait;
use skillforge_core::pending::{PendingPatch, PendingSessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default interval between mid-stream buffer writes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// Stream observer that snapshots progress into the pending buffer.
pub struct PendingAutosave {
    store: Arc<dyn PendingSessionStore>,
    debounce: Duration,
    seed: Option<PendingPatch>,
    last_flush: Option<Instant>,
}

impl PendingAutosave {
    /// Creates an autosave observer. `seed` carries the fields known
    /// before streaming starts; it is merged into the draft on the first
    /// tick.
    pub fn new(store: Arc<dyn PendingSessionStore>, seed: PendingPatch) -> Self {
        Self {
            store,
            debounce: DEFAULT_DEBOUNCE,
            seed: Some(seed),
            last_flush: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    async fn flush(&self, patch: PendingPatch) {
        if let Err(e) = self.store.save(patch).await {
            tracing::warn!("Failed to buffer pending session snapshot: {}", e);
        }
    }
}

#[async_trait]
impl StreamObserver for PendingAutosave {
    async fn on_progress(&mut self, snapshot: StreamSnapshot<'_>) {
        if let Some(seed) = self.seed.take() {
            self.flush(seed).await;
        }

        let due = snapshot.is_complete
            || self
                .last_flush
                .is_none_or(|at| at.elapsed() >= self.debounce);
        if !due {
            return;
        }

        self.flush(
            PendingPatch::new()
                .spec(snapshot.raw)
                .is_complete(snapshot.is_complete),
        )
        .await;
        self.last_flush = Some(Instant::now());
    }
}
