//! Tree walker: the single producer feeding the work queue.
//!
//! Depth-first traversal from the root. Only regular files become
//! work items; directory enumeration errors skip the subtree and the
//! walk continues. The bounded send blocks when the queue is full, so
//! the walker can never run arbitrarily far ahead of the workers.

use crossbeam_channel::Sender;
use std::path::Path;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pool::RunState;
use crate::processor::WorkItem;

/// How the walk ended. An abort is a status, not an error: queued
/// items still drain afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Completed,
    Aborted,
}

pub fn feed_queue(
    root: &Path,
    sender: &Sender<WorkItem>,
    state: &RunState,
) -> Result<WalkStatus> {
    for entry in WalkDir::new(root) {
        // Checked before every enqueue decision; an interrupt or a
        // worker failure stops production promptly.
        if state.should_stop_producing() {
            if state.abort_requested() {
                info!("Walk aborted by interrupt");
            } else {
                info!("Walk stopped after worker failure");
            }
            return Ok(WalkStatus::Aborted);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        // Directories are descended into; symlinks, devices and other
        // non-regular entries are passed over silently.
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                error!("Error reading metadata for {}: {}", entry.path().display(), e);
                state.record_failure();
                continue;
            }
        };

        let item = WorkItem {
            path: entry.into_path(),
            metadata,
        };

        // Blocks while the queue is full. Fails only if every worker
        // is gone, which means the run cannot finish.
        if sender.send(item).is_err() {
            return Err(Error::QueueClosed);
        }
    }

    Ok(WalkStatus::Completed)
}
