//! Fixed worker pool draining the bounded work queue.
//!
//! Workers block on `recv` and exit only once the channel is closed
//! and drained, so every enqueued item is fully processed even after
//! an abort. A single file's failure marks the run failed and the
//! worker moves on to the next item.

use crossbeam_channel::Receiver;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::ledger::Ledger;
use crate::processor::{process_file, Outcome, WorkItem};

/// Shared run flags. Both are monotonic: once set they stay set for
/// the rest of the run. Always accessed through these methods, never
/// as bare fields.
#[derive(Debug, Default)]
pub struct RunState {
    abort: AtomicBool,
    failed: AtomicBool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set by the interrupt handler; stops the walker from enqueuing.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Set by any worker on a processing error; never reset.
    pub fn record_failure(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub fn any_failure(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// The walker checks this before every enqueue decision.
    pub fn should_stop_producing(&self) -> bool {
        self.abort_requested() || self.any_failure()
    }
}

/// Counts aggregated across all workers at join time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub rewritten: u64,
    pub skipped_ignored: u64,
    pub skipped_compact: u64,
    pub skipped_handled: u64,
    pub failed: u64,
}

impl PoolStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Rewritten => self.rewritten += 1,
            Outcome::SkippedIgnored => self.skipped_ignored += 1,
            Outcome::SkippedCompact => self.skipped_compact += 1,
            Outcome::SkippedHandled => self.skipped_handled += 1,
        }
    }

    fn merge(&mut self, other: &PoolStats) {
        self.rewritten += other.rewritten;
        self.skipped_ignored += other.skipped_ignored;
        self.skipped_compact += other.skipped_compact;
        self.skipped_handled += other.skipped_handled;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u64 {
        self.rewritten
            + self.skipped_ignored
            + self.skipped_compact
            + self.skipped_handled
            + self.failed
    }
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<PoolStats>>,
}

impl WorkerPool {
    /// Spawn one named thread per worker, all sharing the queue
    /// receiver, the ledger, and the run state.
    pub fn spawn(
        receiver: Receiver<WorkItem>,
        config: Arc<AppConfig>,
        ledger: Arc<Ledger>,
        state: Arc<RunState>,
    ) -> io::Result<WorkerPool> {
        let mut handles = Vec::with_capacity(config.worker_count);

        for id in 0..config.worker_count {
            let receiver = receiver.clone();
            let config = Arc::clone(&config);
            let ledger = Arc::clone(&ledger);
            let state = Arc::clone(&state);

            let handle = thread::Builder::new()
                .name(format!("recompress-{}", id))
                .spawn(move || worker_loop(id, receiver, config, ledger, state))?;
            handles.push(handle);
        }

        debug!(count = handles.len(), "Workers spawned");
        Ok(WorkerPool { handles })
    }

    /// Returns only after every worker has observed queue closure and
    /// finished its current item.
    pub fn join(self) -> PoolStats {
        let mut stats = PoolStats::default();
        for handle in self.handles {
            match handle.join() {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(_) => warn!("Worker thread panicked"),
            }
        }
        stats
    }
}

fn worker_loop(
    id: usize,
    receiver: Receiver<WorkItem>,
    config: Arc<AppConfig>,
    ledger: Arc<Ledger>,
    state: Arc<RunState>,
) -> PoolStats {
    let mut stats = PoolStats::default();

    // recv fails only once the channel is closed and empty.
    while let Ok(item) = receiver.recv() {
        match process_file(&item, &config, &ledger) {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                error!("Error processing file {}: {}", item.path.display(), e);
                state.record_failure();
                stats.failed += 1;
            }
        }
    }

    debug!(
        worker = id,
        rewritten = stats.rewritten,
        failed = stats.failed,
        "Worker finished"
    );
    stats
}
