//! Per-file processing: the skip filters, the in-place rewrite, and
//! the ledger commit.
//!
//! Steps run in a strict order with early exit on the skip conditions:
//! suffix filter, metadata extraction, compression heuristic, ledger
//! lookup, self-copy, integrity check, timestamp restore, ledger
//! commit. The commit comes last so a crash anywhere before it leaves
//! no record and a resumed run retries the file.

use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::ProcessError;
use crate::ledger::Ledger;
use crate::platform::{self, FileMeta};

/// One discovered file. Created by the walker, owned by exactly one
/// worker, dropped once processing finishes.
#[derive(Debug)]
pub struct WorkItem {
    pub path: PathBuf,
    /// Stat snapshot captured at discovery time.
    pub metadata: fs::Metadata,
}

/// How a file left the processor. Skips are expected short-circuits,
/// not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rewritten,
    SkippedIgnored,
    SkippedCompact,
    SkippedHandled,
}

/// True when allocated storage is already below 10/12 of the logical
/// size, meaning the file beats roughly 1.2:1 compression or is
/// sparse. Multiplies before dividing, widened so huge files cannot
/// overflow.
pub fn already_compact(size: u64, allocated_blocks: u64, block_size: u64) -> bool {
    (block_size as u128) * (allocated_blocks as u128) * 12 < (size as u128) * 10
}

pub fn process_file(
    item: &WorkItem,
    config: &AppConfig,
    ledger: &Ledger,
) -> Result<Outcome, ProcessError> {
    let path = item.path.as_path();

    if config.is_ignored(path) {
        debug!("Skipping ignored file {}", path.display());
        return Ok(Outcome::SkippedIgnored);
    }

    let meta = platform::extract(path, &item.metadata)?;

    if already_compact(meta.size, meta.allocated_blocks, meta.block_size) {
        debug!("Skipping already compressed or sparse file {}", path.display());
        return Ok(Outcome::SkippedCompact);
    }

    if ledger.get(path, meta.device, meta.inode)?.is_some() {
        debug!("Skipping handled file {}", path.display());
        return Ok(Outcome::SkippedHandled);
    }

    debug!("Processing file {}", path.display());

    let copied = rewrite_in_place(path).map_err(|e| ProcessError::io(path, e))?;

    if copied != meta.size {
        return Err(ProcessError::ShortCopy {
            path: path.to_path_buf(),
            copied,
            expected: meta.size,
        });
    }

    restore_times(path, &meta).map_err(|e| ProcessError::io(path, e))?;

    ledger.mark_handled(path, meta.device, meta.inode)?;

    Ok(Outcome::Rewritten)
}

/// Copy the file's full byte stream onto itself through a separate
/// read handle and read-write handle (no truncate, no create). The
/// copy is buffered so the bytes really pass through userspace and
/// the filesystem re-allocates the blocks rather than relinking them.
/// Both handles close on every exit path via drop.
fn rewrite_in_place(path: &Path) -> io::Result<u64> {
    let source = File::open(path)?;
    let target = OpenOptions::new().read(true).write(true).open(path)?;

    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(target);
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    Ok(copied)
}

/// The rewrite touched atime and mtime; put both back to the mtime
/// captured before the copy.
fn restore_times(path: &Path, meta: &FileMeta) -> io::Result<()> {
    let mtime = FileTime::from_system_time(meta.modified);
    filetime::set_file_times(path, mtime, mtime)
}
