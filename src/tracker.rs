//! Single-slot invariant enforcer for the active `source_path` during a walk.
//!
//! At most one `source_path` may be "active" at a time. This is the guard that
//! catches a user who has nested one show inside another: the moment a second,
//! different `source_path` is tracked while one is already active, the scan
//! fails with a conflict rather than silently merging two shows.

use std::path::PathBuf;

use crate::error::ScanError;

#[derive(Debug, Default)]
pub struct SourcePathTracker {
    active: Option<PathBuf>,
}

impl SourcePathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `source_path` as the active one. No-op if it's already active.
    /// Fails the scan if a *different* source_path is already active.
    pub fn track(&mut self, source_path: &PathBuf) -> Result<(), ScanError> {
        match &self.active {
            None => {
                self.active = Some(source_path.clone());
                Ok(())
            }
            Some(current) if current == source_path => Ok(()),
            Some(current) => Err(ScanError::SourcePathConflict {
                first: current.display().to_string(),
                second: source_path.display().to_string(),
            }),
        }
    }

    /// Clear the active slot if it equals `source_path`. Returns whether it was
    /// cleared, which the orchestrator uses to decide whether to flush.
    pub fn remove(&mut self, source_path: &PathBuf) -> bool {
        if self.active.as_ref() == Some(source_path) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> Option<&PathBuf> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_same_path_is_noop() {
        let mut tracker = SourcePathTracker::new();
        let p = PathBuf::from("/root/TV/Show");
        tracker.track(&p).unwrap();
        tracker.track(&p).unwrap();
        assert_eq!(tracker.active(), Some(&p));
    }

    #[test]
    fn track_different_path_conflicts() {
        let mut tracker = SourcePathTracker::new();
        tracker.track(&PathBuf::from("/root/TV/Show A")).unwrap();
        let err = tracker.track(&PathBuf::from("/root/TV/Show B")).unwrap_err();
        assert!(matches!(err, ScanError::SourcePathConflict { .. }));
    }

    #[test]
    fn remove_clears_only_matching_path() {
        let mut tracker = SourcePathTracker::new();
        let p = PathBuf::from("/root/TV/Show");
        tracker.track(&p).unwrap();
        assert!(!tracker.remove(&PathBuf::from("/root/TV/Other")));
        assert!(tracker.remove(&p));
        assert!(tracker.active().is_none());
    }
}
