//! Error taxonomy for the scanner's fatal error classes.
//!
//! Transient I/O and per-root unavailability are *not* represented here — they are
//! logged and folded into [`crate::orchestrator::ScanResult`] instead of aborting the
//! scan. Only the four fatal classes get a variant.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("source path conflict: `{first}` and `{second}` both track the same folder")]
    SourcePathConflict { first: String, second: String },

    #[error("root folder unavailable: {path}")]
    RootUnavailable { path: PathBuf },

    #[error("scan cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("index not found: {index_id}")]
    IndexNotFound { index_id: i64 },

    #[error("scan task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ScanOutcome<T> = Result<T, ScanError>;
