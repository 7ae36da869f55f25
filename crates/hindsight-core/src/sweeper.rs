//! Expired-entry eviction.
//!
//! A sweep enumerates every recency queue (each shared queue once, every
//! exclusive queue) and every reply graph as independent cleanup units, then
//! drains them through a pool of blocking workers sized to the available
//! parallelism. Each unit takes and releases its own lock; no lock is held
//! across units.
//!
//! Cancellation is checked between units: in-flight workers finish their
//! current unit and stop, unprocessed units wait for the next run.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::snapshot::SnapshotStore;
use crate::snapshotter::SnapshotPersister;
use crate::store::{RecencyQueue, ReplyGraph, RootStore};

// ---------------------------------------------------------------------------
// Cleanup units
// ---------------------------------------------------------------------------

/// One independently lockable structure to sweep.
#[derive(Debug, Clone)]
pub enum CleanupUnit {
    Queue(RecencyQueue),
    Graph(ReplyGraph),
}

impl CleanupUnit {
    fn sweep(&self, now: DateTime<Utc>, ttl: TimeDelta, tally: &mut WorkerTally) {
        match self {
            CleanupUnit::Queue(queue) => tally.evicted_lines += queue.evict_expired(now, ttl),
            CleanupUnit::Graph(graph) => tally.evicted_links += graph.evict_expired(now, ttl),
        }
        tally.processed += 1;
    }
}

/// Enumerate the cleanup units of `store`.
///
/// Handles are cloned out under brief read locks, one level at a time.
pub fn collect_units(store: &RootStore) -> Vec<CleanupUnit> {
    let mut units: Vec<CleanupUnit> = store
        .shared_queues()
        .map(|(_, queue)| CleanupUnit::Queue(queue.clone()))
        .collect();

    for (_, directory) in store.agents() {
        for (_, record) in directory.records() {
            if !record.is_shared() {
                units.push(CleanupUnit::Queue(record.queue().clone()));
            }
            units.push(CleanupUnit::Graph(record.chains().clone()));
        }
    }

    debug!(units = units.len(), "collected cleanup units");
    units
}

/// Units handed out to workers by an atomic cursor.
struct JobQueue {
    units: Vec<CleanupUnit>,
    cursor: AtomicUsize,
}

impl JobQueue {
    fn new(units: Vec<CleanupUnit>) -> Self {
        Self {
            units,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<&CleanupUnit> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.units.get(index)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerTally {
    processed: usize,
    evicted_lines: usize,
    evicted_links: usize,
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub units: usize,
    pub processed: usize,
    pub workers: usize,
    pub evicted_lines: usize,
    pub evicted_links: usize,
    /// Stopped by cancellation before every unit was processed.
    pub cancelled: bool,
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
        self.processed == self.units
    }
}

/// Errors from a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// A worker panicked or was aborted; its siblings were cancelled.
    #[error("sweep worker failed: {0}")]
    WorkerFailed(String),
}

/// Evict everything older than `ttl` as of now.
pub async fn sweep(
    store: &RootStore,
    ttl: Duration,
    cancel: &CancellationToken,
) -> Result<SweepReport, SweepError> {
    sweep_at(store, Utc::now(), ttl, cancel).await
}

/// Evict everything older than `ttl` as of `now`.
pub async fn sweep_at(
    store: &RootStore,
    now: DateTime<Utc>,
    ttl: Duration,
    cancel: &CancellationToken,
) -> Result<SweepReport, SweepError> {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    let units = collect_units(store);
    let unit_count = units.len();
    if unit_count == 0 {
        return Ok(SweepReport::default());
    }

    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(unit_count);
    let jobs = Arc::new(JobQueue::new(units));
    // Cancelling the child stops siblings on failure without touching the caller's token.
    let token = cancel.child_token();

    let mut set: JoinSet<WorkerTally> = JoinSet::new();
    for _ in 0..workers {
        let jobs = Arc::clone(&jobs);
        let token = token.clone();
        set.spawn_blocking(move || {
            let mut tally = WorkerTally::default();
            while !token.is_cancelled() {
                let Some(unit) = jobs.next() else {
                    break;
                };
                unit.sweep(now, ttl, &mut tally);
            }
            tally
        });
    }

    let mut report = SweepReport {
        units: unit_count,
        workers,
        ..SweepReport::default()
    };
    let mut failure = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(tally) => {
                report.processed += tally.processed;
                report.evicted_lines += tally.evicted_lines;
                report.evicted_links += tally.evicted_links;
            }
            Err(e) => {
                warn!(error = %e, "sweep worker failed, cancelling the rest");
                token.cancel();
                failure.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if let Some(reason) = failure {
        return Err(SweepError::WorkerFailed(reason));
    }

    report.cancelled = !report.is_complete();
    Ok(report)
}

// ---------------------------------------------------------------------------
// Sweeper task
// ---------------------------------------------------------------------------

/// Periodic sweep followed by a snapshot save.
pub struct Sweeper<S: SnapshotStore> {
    persister: Arc<SnapshotPersister<S>>,
    ttl: Duration,
    interval: Duration,
}

impl<S: SnapshotStore> Sweeper<S> {
    pub fn new(persister: Arc<SnapshotPersister<S>>, ttl: Duration, interval: Duration) -> Self {
        Self {
            persister,
            ttl,
            interval,
        }
    }

    /// Sweep at startup and then every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "sweeper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match sweep(self.persister.store(), self.ttl, &cancel).await {
                Ok(report) if report.cancelled => {
                    info!(
                        processed = report.processed,
                        units = report.units,
                        "sweep cancelled, remaining units left for the next run"
                    );
                    break;
                }
                Ok(report) => {
                    info!(
                        units = report.units,
                        workers = report.workers,
                        evicted_lines = report.evicted_lines,
                        evicted_links = report.evicted_links,
                        "sweep complete"
                    );
                    self.persister.save_logged().await;
                }
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }

        info!("sweeper shut down");
    }
}
