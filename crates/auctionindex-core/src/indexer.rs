//! The index loop — one owned instance per tracked event-type stream.
//!
//! Cycle: load cursor → fetch batch → decode/apply each event in ledger
//! order → durably save the new cursor → sleep. A decode failure skips the
//! record and continues the batch; a store failure aborts the batch without
//! advancing the cursor, so the whole batch is re-fetched and re-applied
//! (idempotently) next cycle. Retryable errors back off exponentially with
//! a cap; a cursor-invalidity error halts the loop and surfaces as fatal.
//!
//! Shutdown is cooperative and checked between batches only — a batch
//! always commits or fully aborts, never partially.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::cursor::CursorStore;
use crate::decode::decode;
use crate::error::IndexerError;
use crate::reconcile::Reconciler;
use crate::source::EventSource;
use crate::types::EventStreamFilter;

/// Configuration for one index loop.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Loop name used in logs, e.g. `"auction-created"`.
    pub id: String,
    /// The event-type stream this loop tracks.
    pub filter: EventStreamFilter,
    /// Page size per fetch.
    pub batch_limit: usize,
    /// Sleep between cycles when caught up (milliseconds).
    pub poll_interval_ms: u64,
    /// Backoff policy for retryable errors.
    pub backoff: BackoffConfig,
    /// Stop after this many successful cycles (`None` = run forever).
    /// Used for bounded drains and tests.
    pub max_batches: Option<u64>,
}

impl IndexerConfig {
    pub fn new(id: impl Into<String>, filter: EventStreamFilter) -> Self {
        Self {
            id: id.into(),
            filter,
            batch_limit: 100,
            poll_interval_ms: 2000,
            backoff: BackoffConfig::default(),
            max_batches: None,
        }
    }
}

/// Runtime state of an index loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting out the poll interval.
    Idle,
    /// Querying the event source.
    Fetching,
    /// Decoding and reconciling the current batch.
    Applying,
    /// Persisting the advanced cursor.
    Committing,
    /// Waiting out a retry delay after a transient error.
    Backoff,
    /// Terminated on a fatal error or shutdown.
    Halted,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Applying => write!(f, "applying"),
            Self::Committing => write!(f, "committing"),
            Self::Backoff => write!(f, "backoff"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// Summary of one committed cycle.
#[derive(Debug, Default)]
struct BatchStats {
    fetched: usize,
    applied: usize,
    skipped: usize,
}

/// One polling loop over a single event-type stream.
///
/// Loops for different streams run as independent tasks and share only the
/// materialized store; each owns a disjoint cursor key.
pub struct IndexLoop<S: EventSource> {
    config: IndexerConfig,
    source: S,
    reconciler: Reconciler,
    cursors: Arc<dyn CursorStore>,
    backoff: BackoffPolicy,
    state: LoopState,
}

impl<S: EventSource> IndexLoop<S> {
    pub fn new(
        config: IndexerConfig,
        source: S,
        reconciler: Reconciler,
        cursors: Arc<dyn CursorStore>,
    ) -> Self {
        let backoff = BackoffPolicy::new(config.backoff.clone());
        Self {
            config,
            source,
            reconciler,
            cursors,
            backoff,
            state: LoopState::Idle,
        }
    }

    /// Current state (for observability).
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until shutdown, a fatal error, or `max_batches` cycles.
    ///
    /// The cursor of the last committed batch is already durable when this
    /// returns; shutdown never loses position.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), IndexerError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut attempt: u32 = 0;
        let mut batches: u64 = 0;

        info!(stream = %self.config.id, filter = %self.config.filter.stream_key(), "index loop started");

        loop {
            if *shutdown.borrow() {
                self.state = LoopState::Halted;
                info!(stream = %self.config.id, "index loop stopped on shutdown signal");
                return Ok(());
            }

            match self.run_batch().await {
                Ok(_) => {
                    attempt = 0;
                    batches += 1;
                    if let Some(max) = self.config.max_batches {
                        if batches >= max {
                            self.state = LoopState::Halted;
                            info!(stream = %self.config.id, batches, "bounded run complete");
                            return Ok(());
                        }
                    }
                    self.state = LoopState::Idle;
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    self.state = LoopState::Backoff;
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        stream = %self.config.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient error, retrying batch from same cursor"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    self.state = LoopState::Halted;
                    error!(
                        stream = %self.config.id,
                        error = %e,
                        "fatal error, loop halted; operator intervention required"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// One fetch→apply→commit cycle. Returns stats on success; the cursor
    /// is only advanced when every decodable event was reconciled.
    async fn run_batch(&mut self) -> Result<BatchStats, IndexerError> {
        self.state = LoopState::Fetching;
        let key = self.config.filter.stream_key().to_string();
        let cursor = self.cursors.load(&key).await?;

        let page = self
            .source
            .fetch_since(&self.config.filter, cursor.as_ref(), self.config.batch_limit)
            .await?;

        if page.events.is_empty() {
            return Ok(BatchStats::default());
        }

        self.state = LoopState::Applying;
        let mut stats = BatchStats {
            fetched: page.events.len(),
            ..BatchStats::default()
        };
        for raw in &page.events {
            match decode(raw) {
                Ok(event) => {
                    // A store failure here aborts the whole batch; the
                    // cursor stays put and the batch is retried whole.
                    self.reconciler.apply(&event).await?;
                    stats.applied += 1;
                }
                Err(e) => {
                    warn!(
                        stream = %self.config.id,
                        position = %raw.position,
                        event_type = %raw.event_type,
                        error = %e,
                        "skipping undecodable event"
                    );
                    stats.skipped += 1;
                }
            }
        }

        self.state = LoopState::Committing;
        let next = page
            .next_cursor
            .ok_or_else(|| IndexerError::Other("non-empty page without next cursor".into()))?;
        self.cursors.save(&key, next.clone()).await?;

        info!(
            stream = %self.config.id,
            fetched = stats.fetched,
            applied = stats.applied,
            skipped = stats.skipped,
            cursor = %next.position,
            "batch committed"
        );
        Ok(stats)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
