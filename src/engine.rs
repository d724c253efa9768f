//! Run orchestration: ledger, pool, walk, drain, ledger retention.

use crossbeam_channel::bounded;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::pool::{PoolStats, RunState, WorkerPool};
use crate::scanner::{self, WalkStatus};

/// What a finished run looked like.
#[derive(Debug)]
pub struct RunReport {
    pub stats: PoolStats,
    pub walk_status: WalkStatus,
    pub duration: Duration,
    /// True when the resume ledger was kept on disk for a later run.
    pub ledger_retained: bool,
}

impl RunReport {
    /// A run counts as failed only on accumulated per-file errors;
    /// a clean interrupt is not a failure.
    pub fn succeeded(&self) -> bool {
        self.stats.failed == 0
    }
}

pub struct RecompressEngine {
    config: AppConfig,
    state: Arc<RunState>,
}

impl RecompressEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: Arc::new(RunState::new()),
        }
    }

    /// Shared run flags, for wiring up the interrupt handler and for
    /// cancelling from tests without OS signals.
    pub fn run_state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    /// Walk the tree, rewrite every eligible file, and decide whether
    /// the resume ledger survives the run.
    ///
    /// The queue capacity is twice the worker count; the walker blocks
    /// when workers fall behind. Whatever happens to the walk, the
    /// queue is closed and fully drained before this returns.
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        info!(
            root = %self.config.root.display(),
            workers = self.config.worker_count,
            resume = self.config.resume,
            "Starting recompression run"
        );

        let ledger = Arc::new(Ledger::open(&self.config.ledger_path, self.config.resume)?);

        let (tx, rx) = bounded(self.config.queue_capacity());
        let pool = WorkerPool::spawn(
            rx,
            Arc::new(self.config.clone()),
            Arc::clone(&ledger),
            Arc::clone(&self.state),
        )?;

        // Produce on this thread; close the queue before joining so
        // the workers' recv loops terminate once it is drained.
        let walk_result = scanner::feed_queue(&self.config.root, &tx, &self.state);
        drop(tx);
        let stats = pool.join();

        let walk_status = walk_result?;

        let clean = walk_status == WalkStatus::Completed
            && !self.state.any_failure()
            && !self.state.abort_requested();

        let mut ledger_retained = false;
        match Arc::try_unwrap(ledger) {
            Ok(ledger) => {
                if clean {
                    ledger.discard()?;
                } else {
                    ledger_retained = ledger.is_enabled();
                    if ledger_retained {
                        debug!("Keeping resume ledger for the next run");
                    }
                }
            }
            // All workers have joined, so this should be unreachable.
            Err(_) => {
                warn!("Resume ledger still referenced at shutdown; leaving it in place");
                ledger_retained = self.config.resume;
            }
        }

        let duration = start.elapsed();
        info!(
            rewritten = stats.rewritten,
            skipped_ignored = stats.skipped_ignored,
            skipped_compact = stats.skipped_compact,
            skipped_handled = stats.skipped_handled,
            failed = stats.failed,
            duration_secs = duration.as_secs_f64(),
            "Run finished"
        );

        Ok(RunReport {
            stats,
            walk_status,
            duration,
            ledger_retained,
        })
    }
}
