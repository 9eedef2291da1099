//! Control interface: `scan` / `cancel` / `status` per index, serialized so at
//! most one scan runs per index while different indices scan in parallel.
//!
//! One async function per host-facing action, each taking an `index_id` and
//! returning a plain value or `Result` — a host (the CLI binary, or
//! eventually a web/tray frontend) calls `scan`/`cancel`/`status` directly as
//! a library API rather than through an IPC boundary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use crate::db::DbConn;
use crate::db::repository::Repository;
use crate::db::schema::ScanStatus;
use crate::error::ScanError;
use crate::orchestrator::{self, ScanProgress, ScanResult};

/// Snapshot returned by `status`: the persisted job state plus a live
/// progress counter for whichever scan (if any) is currently running.
#[derive(Debug, Clone, Default)]
pub struct IndexStatus {
    pub status: ScanStatus,
    pub progress: ScanProgress,
}

/// Per-index state the control interface needs across calls: an async mutex
/// that serializes scans of this index, a cooperative cancel flag, and the
/// shared progress cell the orchestrator writes into as it walks.
struct IndexState {
    lock: AsyncMutex<()>,
    cancel: Arc<AtomicBool>,
    progress: Arc<SyncMutex<ScanProgress>>,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            lock: AsyncMutex::new(()),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(SyncMutex::new(ScanProgress::default())),
        }
    }
}

/// The scanner's control surface. Owns nothing about individual scans beyond
/// their in-flight coordination state — the durable record is always the
/// database (`indexes`, `scan_jobs`), so a fresh `ScanService` over the same
/// database recovers cleanly.
pub struct ScanService {
    db: DbConn,
    states: SyncMutex<HashMap<i64, Arc<IndexState>>>,
}

impl ScanService {
    /// Open the control surface over `db`, coercing any `scanning` job left
    /// over from a prior process into `queued` — a restart means every
    /// in-flight scan crashed mid-walk, per the scanner's state machine.
    pub fn new(db: DbConn) -> Self {
        let repo = Repository::new(db.clone());
        match repo.reset_scanning_jobs_to_queued() {
            Ok(0) => {}
            Ok(n) => info!(count = n, "control: coerced stale scanning jobs back to queued"),
            Err(e) => error!(error = %e, "control: failed to reset stale scan jobs on startup"),
        }
        Self { db, states: SyncMutex::new(HashMap::new()) }
    }

    fn state_for(&self, index_id: i64) -> Arc<IndexState> {
        let mut states = self.states.lock().unwrap();
        states.entry(index_id).or_default().clone()
    }

    /// Run a scan of `index_id` to completion. Re-entrant-safe: a second call
    /// while one is already running for the same index blocks on the
    /// per-index lock rather than racing it (different indices proceed
    /// concurrently without contending on this lock).
    pub async fn scan(&self, index_id: i64) -> Result<ScanResult, ScanError> {
        let state = self.state_for(index_id);
        let _guard = state.lock.lock().await;
        state.cancel.store(false, Ordering::Relaxed);
        *state.progress.lock().unwrap() = ScanProgress::default();

        let repo = Repository::new(self.db.clone());
        let index = repo.get_index(index_id)?.ok_or(ScanError::IndexNotFound { index_id })?;
        let roots: Vec<PathBuf> = index.roots.iter().map(PathBuf::from).collect();

        repo.set_job_status(index_id, ScanStatus::Scanning)?;
        info!(index_id, roots = roots.len(), "control: scan started");

        let cancel = state.cancel.clone();
        let progress = state.progress.clone();
        let db = self.db.clone();

        let result = tokio::task::spawn_blocking(move || {
            let repo = Repository::new(db);
            orchestrator::scan_index(&repo, index_id, &roots, &cancel, &progress)
        })
        .await?;

        // Every flush along the way already committed; only the job status
        // reflects the scan's terminal state here.
        repo.set_job_status(index_id, ScanStatus::Idle)?;

        match &result {
            Ok(r) => info!(
                index_id,
                added = r.added,
                updated = r.updated,
                migrated = r.migrated,
                skipped = r.skipped,
                "control: scan completed"
            ),
            Err(ScanError::Cancelled) => info!(index_id, "control: scan cancelled"),
            Err(e) => error!(index_id, error = %e, "control: scan failed"),
        }

        result
    }

    /// Request cancellation of an in-flight scan of `index_id`. Cooperative:
    /// takes effect the next time the orchestrator checks between files. A
    /// no-op if no scan is currently running for this index.
    pub fn cancel(&self, index_id: i64) {
        let state = self.state_for(index_id);
        state.cancel.store(true, Ordering::Relaxed);
        info!(index_id, "control: cancel requested");
    }

    /// Current persisted status plus a live progress snapshot. Never blocks
    /// on a running scan — reads the shared progress cell without taking the
    /// per-index scan lock.
    pub async fn status(&self, index_id: i64) -> Result<IndexStatus, ScanError> {
        let repo = Repository::new(self.db.clone());
        let status = repo.get_job_status(index_id)?;
        let state = self.state_for(index_id);
        let progress = state.progress.lock().unwrap().clone();
        Ok(IndexStatus { status, progress })
    }
}
