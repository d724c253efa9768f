use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors: anything that prevents the run from starting or
/// continuing at all. Per-file trouble is `ProcessError` instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to open resume ledger at '{}': {source}", .path.display())]
    LedgerOpen {
        path: PathBuf,
        source: rocksdb::Error,
    },

    #[error("Work queue closed unexpectedly")]
    QueueClosed,
}

/// Per-file processing errors. These are logged, counted against the
/// run, and never stop other files. The ledger is left unwritten for
/// the file so a resumed run retries it.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("unsupported file metadata for '{}': {reason}", .path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error("'{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rewrote {copied} bytes of '{}', expected {expected}", .path.display())]
    ShortCopy {
        path: PathBuf,
        copied: u64,
        expected: u64,
    },

    #[error("ledger error for '{}': {reason}", .path.display())]
    Ledger { path: PathBuf, reason: String },
}

impl ProcessError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ProcessError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn ledger(path: &std::path::Path, reason: impl ToString) -> Self {
        ProcessError::Ledger {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
