//! Per-scan buffers of pending content, keyed by `source_path`.
//!
//! Staging exists so a show/movie's files can be discovered incrementally across
//! a directory walk and only written to the database once their owning
//! `source_path` is known to be fully visited (see `tracker`). It is wiped at
//! the start of every scan: a crash mid-walk leaves stale entries that are
//! always safe to discard, since the next walk rediscovers every file's
//! identity from scratch.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::classifier::Classification;
use crate::fs_probe::FileProbe;

#[derive(Debug, Clone)]
pub struct StagedEntry {
    pub path: PathBuf,
    pub classification: Classification,
    pub probe: FileProbe,
}

/// Key for grouping staged entries: the classified `source_path`, or `None` for
/// loose movies/generics with no owning folder.
pub type StageKey = Option<PathBuf>;

#[derive(Debug, Default)]
pub struct Staging {
    new_content: HashMap<StageKey, Vec<StagedEntry>>,
    extras: HashMap<StageKey, Vec<StagedEntry>>,
}

impl Staging {
    /// Wipe both buffers. Called once at the start of every scan to recover
    /// from any prior crash; never called mid-scan.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_content(&mut self, key: StageKey, entry: StagedEntry) {
        self.new_content.entry(key).or_default().push(entry);
    }

    pub fn stage_extra(&mut self, key: StageKey, entry: StagedEntry) {
        self.extras.entry(key).or_default().push(entry);
    }

    /// Remove and return everything staged under `key`: new content first,
    /// extras second — the order flush writes them in.
    pub fn take(&mut self, key: &StageKey) -> (Vec<StagedEntry>, Vec<StagedEntry>) {
        let content = self.new_content.remove(key).unwrap_or_default();
        let extras = self.extras.remove(key).unwrap_or_default();
        (content, extras)
    }

    pub fn is_empty(&self) -> bool {
        self.new_content.is_empty() && self.extras.is_empty()
    }

    /// Every key with content still pending, for the final post-walk flush.
    pub fn pending_keys(&self) -> Vec<StageKey> {
        let mut keys: Vec<StageKey> = self.new_content.keys().cloned().collect();
        for key in self.extras.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, MediaKind};

    fn dummy_entry(path: &str) -> StagedEntry {
        StagedEntry {
            path: PathBuf::from(path),
            classification: Classification {
                media_type: Some(MediaKind::Generic),
                ..Default::default()
            },
            probe: FileProbe { size: 1, mtime: 0, fast_hash: "x".into() },
        }
    }

    #[test]
    fn take_drains_both_buffers_for_key() {
        let mut staging = Staging::new();
        let key = Some(PathBuf::from("/root/TV/Show"));
        staging.stage_content(key.clone(), dummy_entry("/root/TV/Show/e01.mkv"));
        staging.stage_extra(key.clone(), dummy_entry("/root/TV/Show/Trailers/t1.mkv"));

        let (content, extras) = staging.take(&key);
        assert_eq!(content.len(), 1);
        assert_eq!(extras.len(), 1);
        assert!(staging.is_empty());
    }

    #[test]
    fn take_on_missing_key_is_empty() {
        let mut staging = Staging::new();
        let (content, extras) = staging.take(&Some(PathBuf::from("/nope")));
        assert!(content.is_empty());
        assert!(extras.is_empty());
    }
}
