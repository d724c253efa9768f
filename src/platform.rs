//! Platform-specific file metadata access.
//!
//! The heuristic and the ledger both need fields that `std::fs::Metadata`
//! only exposes through platform extension traits (allocated blocks,
//! block size, inode, device). Extraction lives behind one accessor so
//! unsupported platforms fail with a clear metadata error instead of a
//! missing-method surprise elsewhere in the pipeline.

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use crate::error::ProcessError;

/// Snapshot of the stat fields the processor needs, captured from the
/// directory-entry metadata taken at discovery time.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Logical size in bytes.
    pub size: u64,
    /// Allocated storage, in `block_size`-sized units as reported by
    /// the platform stat structure.
    pub allocated_blocks: u64,
    pub block_size: u64,
    pub inode: u64,
    pub device: u64,
    pub modified: SystemTime,
}

#[cfg(unix)]
pub fn extract(path: &Path, metadata: &Metadata) -> Result<FileMeta, ProcessError> {
    use std::os::unix::fs::MetadataExt;

    let modified = metadata
        .modified()
        .map_err(|e| ProcessError::io(path, e))?;

    Ok(FileMeta {
        size: metadata.size(),
        allocated_blocks: metadata.blocks(),
        block_size: metadata.blksize(),
        inode: metadata.ino(),
        device: metadata.dev(),
        modified,
    })
}

#[cfg(not(unix))]
pub fn extract(path: &Path, _metadata: &Metadata) -> Result<FileMeta, ProcessError> {
    Err(ProcessError::Metadata {
        path: path.to_path_buf(),
        reason: "block allocation counts are only available on unix".to_string(),
    })
}
