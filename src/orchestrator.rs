//! Directory walk, staging, flush and migration dispatch for a single scan.
//!
//! Visit order is files-before-subdirs, depth-first — implemented with plain
//! recursion rather than a hand-rolled
//! `Vec` stack: the call stack already *is* an explicit stack, and recursion
//! gives a natural place to hang the postorder "did I just finish the
//! directory that's the active source_path?" check without a sentinel value.
//! Visit order and the flush-on-exit semantics are unchanged either way.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::classifier::{self, Classification, MediaKind};
use crate::db::repository::{EpisodeSpec, PartAttrs, Repository, SeasonSpec, ShowSpec, VersionAttrs};
use crate::db::schema::ItemType;
use crate::error::ScanError;
use crate::fs_probe::{self, FileProbe};
use crate::migration;
use crate::staging::{StageKey, StagedEntry, Staging};
use crate::tracker::SourcePathTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOutcome {
    Completed,
    Unavailable,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub root_outcomes: Vec<(PathBuf, RootOutcome)>,
    pub added: u64,
    pub updated: u64,
    pub migrated: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub files_seen: u64,
    pub movies_seen: u64,
    pub tv_episodes_seen: u64,
    pub extras_seen: u64,
    pub generic_seen: u64,
    pub items_flushed: u64,
    pub roots_total: usize,
    pub roots_done: usize,
    pub current_root: Option<PathBuf>,
}

struct ScanContext<'a> {
    repo: &'a Repository,
    index_id: i64,
    cancel: &'a AtomicBool,
    progress: &'a Mutex<ScanProgress>,
    result: ScanResult,
}

/// Walk every root of `index_id`, classifying, reconciling and flushing each
/// source_path's staged files. Roots that don't exist are recorded as
/// `RootOutcome::Unavailable` and skipped; remaining roots still scan.
pub fn scan_index(
    repo: &Repository,
    index_id: i64,
    roots: &[PathBuf],
    cancel: &AtomicBool,
    progress: &Mutex<ScanProgress>,
) -> Result<ScanResult, ScanError> {
    {
        let mut p = progress.lock().unwrap();
        p.roots_total = roots.len();
        p.roots_done = 0;
    }

    let mut ctx = ScanContext {
        repo,
        index_id,
        cancel,
        progress,
        result: ScanResult::default(),
    };

    for root in roots {
        progress.lock().unwrap().current_root = Some(root.clone());

        if !root.is_dir() {
            warn!(root = %root.display(), "scan: root unavailable");
            ctx.result.root_outcomes.push((root.clone(), RootOutcome::Unavailable));
            progress.lock().unwrap().roots_done += 1;
            continue;
        }

        let mut tracker = SourcePathTracker::new();
        let mut staging = Staging::new();

        info!(root = %root.display(), "scan: root started");
        walk_dir(&mut ctx, root, &mut tracker, &mut staging)?;

        // Post-walk: flush anything left staged (content with no source_path,
        // or a source_path whose owning directory never got a postorder hit
        // because it *is* the root itself).
        for key in staging.pending_keys() {
            let (content, extras) = staging.take(&key);
            flush(&mut ctx, &key, content, extras)?;
        }

        ctx.result.root_outcomes.push((root.clone(), RootOutcome::Completed));
        progress.lock().unwrap().roots_done += 1;
        info!(root = %root.display(), "scan: root completed");
    }

    Ok(ctx.result)
}

fn check_cancelled(cancel: &AtomicBool) -> Result<(), ScanError> {
    if cancel.load(Ordering::Relaxed) {
        Err(ScanError::Cancelled)
    } else {
        Ok(())
    }
}

fn walk_dir(
    ctx: &mut ScanContext<'_>,
    dir: &Path,
    tracker: &mut SourcePathTracker,
    staging: &mut Staging,
) -> Result<(), ScanError> {
    check_cancelled(ctx.cancel)?;

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    subdirs.push(path);
                } else if path.is_file() {
                    files.push(path);
                }
            }
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "scan: skipping unreadable directory");
            return Ok(());
        }
    }
    files.sort();
    subdirs.sort();

    for file in &files {
        process_file(ctx, file, tracker, staging)?;
    }

    for subdir in &subdirs {
        walk_dir(ctx, subdir, tracker, staging)?;
    }

    if tracker.remove(&dir.to_path_buf()) {
        let key: StageKey = Some(dir.to_path_buf());
        let (content, extras) = staging.take(&key);
        flush(ctx, &key, content, extras)?;
    }

    Ok(())
}

fn process_file(
    ctx: &mut ScanContext<'_>,
    path: &Path,
    tracker: &mut SourcePathTracker,
    staging: &mut Staging,
) -> Result<(), ScanError> {
    let ext = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
    if !classifier::is_video_extension(&ext) {
        return Ok(());
    }

    ctx.progress.lock().unwrap().files_seen += 1;

    let probe = match fs_probe::probe(path) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "scan: skipping unreadable file");
            ctx.result.skipped += 1;
            return Ok(());
        }
    };

    let classification = classifier::classify(path);
    record_kind_seen(ctx, &classification);

    let existing = ctx.repo.find_part_by_identity(probe.size as i64, &probe.fast_hash)?;

    if let Some(part) = existing.into_iter().next() {
        reconcile_existing(ctx, path, &probe, &classification, part.id, &part.path, part.version_id)?;
        return Ok(());
    }

    stage_new_file(ctx, path, &probe, classification, tracker, staging)?;
    Ok(())
}

fn record_kind_seen(ctx: &ScanContext<'_>, classification: &Classification) {
    let mut p = ctx.progress.lock().unwrap();
    match classification.media_type {
        Some(MediaKind::Movie) => p.movies_seen += 1,
        Some(MediaKind::TvEpisode) => p.tv_episodes_seen += 1,
        Some(MediaKind::Extra) => p.extras_seen += 1,
        _ => p.generic_seen += 1,
    }
}

fn reconcile_existing(
    ctx: &mut ScanContext<'_>,
    path: &Path,
    probe: &FileProbe,
    classification: &Classification,
    part_id: i64,
    stored_path: &str,
    version_id: i64,
) -> Result<(), ScanError> {
    let path_str = path.to_string_lossy().to_string();

    if stored_path == path_str {
        ctx.repo.update_part_path(part_id, &path_str, probe.mtime)?;
        ctx.result.updated += 1;
        return Ok(());
    }

    let version = ctx
        .repo
        .get_version(version_id)?
        .ok_or_else(|| ScanError::Storage(rusqlite::Error::QueryReturnedNoRows))?;
    let owner = ctx.repo.find_owning_container(version.item_id)?;

    match owner {
        Some(owner) if matches!(owner.item_type, ItemType::Show | ItemType::Movie) => {
            let old_source_path = owner.source_path.as_ref().map(PathBuf::from);
            if old_source_path.as_ref() == classification.source_path.as_ref() {
                // Same source_path: the show/movie itself hasn't moved. For a
                // TV episode this can still mean a season/episode reassignment
                // within the show (e.g. moved into a Specials folder) — walk
                // or create the right episode under the *same* show and
                // reparent the part onto it if it isn't already there.
                if owner.item_type == ItemType::Show && classification.media_type == Some(MediaKind::TvEpisode) {
                    let desired_episode_id = ctx.repo.upsert_episode_under_show(
                        ctx.index_id,
                        owner.id,
                        SeasonSpec { number: classification.season.unwrap_or(1) },
                        EpisodeSpec {
                            number: classification.episode.unwrap_or(1),
                            title: classification.episode_title.as_deref(),
                        },
                    )?;
                    if desired_episode_id != version.item_id {
                        ctx.repo.reparent_part(part_id, desired_episode_id)?;
                    }
                }
                ctx.repo.update_part_path(part_id, &path_str, probe.mtime)?;
                ctx.result.updated += 1;
            } else if let Some(new_source_path) = &classification.source_path {
                let new_title = classification
                    .title
                    .clone()
                    .unwrap_or_else(|| classifier::show_title_from_path(new_source_path));
                let placement = match (owner.item_type, classification.media_type) {
                    (ItemType::Show, Some(MediaKind::TvEpisode)) => migration::Placement::TvEpisode {
                        season: classification.season.unwrap_or(1),
                        episode: classification.episode.unwrap_or(1),
                        episode_title: classification.episode_title.as_deref(),
                    },
                    _ => migration::Placement::Direct,
                };
                migration::migrate(ctx.repo, part_id, &owner, new_source_path, &new_title, placement)?;
                ctx.repo.update_part_path(part_id, &path_str, probe.mtime)?;
                ctx.result.migrated += 1;
            } else {
                // Moved to a location with no source_path concept (e.g. loose
                // at the library root). Not covered by the migration table;
                // update the path in place and leave the owning item as-is.
                ctx.repo.update_part_path(part_id, &path_str, probe.mtime)?;
                ctx.result.updated += 1;
            }
        }
        _ => {
            ctx.repo.update_part_path(part_id, &path_str, probe.mtime)?;
            ctx.result.updated += 1;
        }
    }

    Ok(())
}

fn stage_new_file(
    ctx: &mut ScanContext<'_>,
    path: &Path,
    probe: &FileProbe,
    classification: Classification,
    tracker: &mut SourcePathTracker,
    staging: &mut Staging,
) -> Result<(), ScanError> {
    let entry = StagedEntry {
        path: path.to_path_buf(),
        classification: classification.clone(),
        probe: probe.clone(),
    };

    if classification.media_type == Some(MediaKind::Extra) {
        // Keyed by the extra's own resolved ancestor (nearest show/movie
        // folder), not the tracker's transient slot: an Extras folder can sort
        // before the season folder that would otherwise set it, in which case
        // the tracker is empty and the show linkage would be lost.
        let key = classification.source_path.clone();
        staging.stage_extra(key, entry);
        return Ok(());
    }

    if let Some(source_path) = &classification.source_path {
        tracker.track(source_path)?;
        staging.stage_content(Some(source_path.clone()), entry);
        return Ok(());
    }

    if classification.media_type == Some(MediaKind::Movie) && tracker.active().is_none() {
        insert_loose_movie(ctx, &entry)?;
        return Ok(());
    }

    staging.stage_content(None, entry);
    Ok(())
}

fn insert_loose_movie(ctx: &mut ScanContext<'_>, entry: &StagedEntry) -> Result<(), ScanError> {
    let title = entry.classification.title.clone().unwrap_or_else(|| "Unknown".to_string());
    let path = entry.path.to_string_lossy().to_string();
    ctx.repo.place_movie_part(
        ctx.index_id,
        None,
        &title,
        entry.classification.year,
        VersionAttrs { edition: entry.classification.edition.as_deref(), ..Default::default() },
        PartAttrs {
            path: &path,
            size: entry.probe.size as i64,
            mtime: entry.probe.mtime,
            fast_hash: &entry.probe.fast_hash,
            part_index: entry.classification.part_index,
        },
    )?;
    ctx.result.added += 1;
    ctx.progress.lock().unwrap().items_flushed += 1;
    Ok(())
}

/// Write every staged entry under one `source_path` to the database. Each
/// entry is its own repository transaction (`place_tv_part` and friends), so
/// a crash between two entries leaves both the already-written and the
/// not-yet-written one in a consistent state — never a half-written item with
/// no version, or a version with no part.
fn flush(
    ctx: &mut ScanContext<'_>,
    key: &StageKey,
    content: Vec<StagedEntry>,
    extras: Vec<StagedEntry>,
) -> Result<(), ScanError> {
    if content.is_empty() && extras.is_empty() {
        return Ok(());
    }
    info!(source_path = ?key, files = content.len() + extras.len(), "scan: flushing");

    for entry in content {
        match entry.classification.media_type {
            Some(MediaKind::TvEpisode) => flush_episode(ctx, &entry)?,
            Some(MediaKind::Movie) => flush_movie(ctx, &entry)?,
            _ => flush_generic(ctx, &entry)?,
        }
        ctx.result.added += 1;
    }

    for entry in &extras {
        flush_extra(ctx, entry)?;
        ctx.result.added += 1;
    }

    ctx.progress.lock().unwrap().items_flushed += 1;
    Ok(())
}

fn flush_episode(ctx: &ScanContext<'_>, entry: &StagedEntry) -> Result<(), ScanError> {
    let c = &entry.classification;
    let show_title = c.title.clone().unwrap_or_else(|| {
        c.source_path
            .as_deref()
            .map(classifier::show_title_from_path)
            .unwrap_or_else(|| "Unknown Show".to_string())
    });
    let source_path = c.source_path.as_ref().map(|p| p.to_string_lossy().to_string());
    let path = entry.path.to_string_lossy().to_string();

    ctx.repo.place_tv_part(
        ctx.index_id,
        ShowSpec { title: &show_title, source_path: source_path.as_deref() },
        SeasonSpec { number: c.season.unwrap_or(1) },
        EpisodeSpec { number: c.episode.unwrap_or(1), title: c.episode_title.as_deref() },
        VersionAttrs::default(),
        PartAttrs {
            path: &path,
            size: entry.probe.size as i64,
            mtime: entry.probe.mtime,
            fast_hash: &entry.probe.fast_hash,
            part_index: c.part_index,
        },
    )?;
    Ok(())
}

fn flush_movie(ctx: &ScanContext<'_>, entry: &StagedEntry) -> Result<(), ScanError> {
    let c = &entry.classification;
    let title = c.title.clone().unwrap_or_else(|| "Unknown".to_string());
    let source_path = c.source_path.as_ref().map(|p| p.to_string_lossy().to_string());
    let path = entry.path.to_string_lossy().to_string();

    ctx.repo.place_movie_part(
        ctx.index_id,
        source_path.as_deref(),
        &title,
        c.year,
        VersionAttrs { edition: c.edition.as_deref(), ..Default::default() },
        PartAttrs {
            path: &path,
            size: entry.probe.size as i64,
            mtime: entry.probe.mtime,
            fast_hash: &entry.probe.fast_hash,
            part_index: c.part_index,
        },
    )?;
    Ok(())
}

fn flush_generic(ctx: &ScanContext<'_>, entry: &StagedEntry) -> Result<(), ScanError> {
    let title = entry
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());
    let path = entry.path.to_string_lossy().to_string();

    ctx.repo.place_leaf_part(
        ctx.index_id,
        ItemType::Video,
        &title,
        PartAttrs {
            path: &path,
            size: entry.probe.size as i64,
            mtime: entry.probe.mtime,
            fast_hash: &entry.probe.fast_hash,
            part_index: None,
        },
    )?;
    Ok(())
}

fn flush_extra(ctx: &ScanContext<'_>, entry: &StagedEntry) -> Result<(), ScanError> {
    let title = entry
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());
    let extra_kind = entry.classification.extra_kind.map(|k| k.as_str()).unwrap_or("other");
    let parent_source_path = entry.classification.source_path.as_ref().map(|p| p.to_string_lossy().to_string());
    let path = entry.path.to_string_lossy().to_string();

    ctx.repo.place_extra_part(
        ctx.index_id,
        &title,
        extra_kind,
        parent_source_path.as_deref(),
        PartAttrs {
            path: &path,
            size: entry.probe.size as i64,
            mtime: entry.probe.mtime,
            fast_hash: &entry.probe.fast_hash,
            part_index: None,
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::db::schema::ItemType;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    fn run_scan(repo: &Repository, index_id: i64, root: &Path) -> ScanResult {
        let cancel = AtomicBool::new(false);
        let progress = Mutex::new(ScanProgress::default());
        scan_index(repo, index_id, &[root.to_path_buf()], &cancel, &progress).unwrap()
    }

    #[test]
    fn s1_single_episode_builds_show_season_episode() {
        let tmp = tempfile::tempdir().unwrap();
        let show_dir = tmp.path().join("TV/Some Show/Season 1");
        std::fs::create_dir_all(&show_dir).unwrap();
        std::fs::write(show_dir.join("Some.Show.S01E01.mkv"), b"content").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let result = run_scan(&repo, index_id, &tmp.path().join("TV"));
        assert_eq!(result.added, 1);

        let show_path = tmp.path().join("TV/Some Show").to_string_lossy().to_string();
        let shows = repo.find_items_by_source_path(index_id, &show_path).unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].item_type, ItemType::Show);

        let season = repo.find_children_by_parent_and_number(shows[0].id, 1).unwrap();
        assert_eq!(season.len(), 1);
        assert_eq!(season[0].item_type, ItemType::Season);

        let episode = repo.find_children_by_parent_and_number(season[0].id, 1).unwrap();
        assert_eq!(episode.len(), 1);
        assert_eq!(episode[0].item_type, ItemType::Episode);
    }

    #[test]
    fn s2_second_edition_adds_version_not_duplicate_movie() {
        let tmp = tempfile::tempdir().unwrap();
        let movie_dir = tmp.path().join("Movies/Avatar (2009)");
        std::fs::create_dir_all(&movie_dir).unwrap();
        std::fs::write(movie_dir.join("Avatar (2009).mkv"), b"default cut").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        run_scan(&repo, index_id, &tmp.path().join("Movies"));

        std::fs::write(movie_dir.join("Avatar (2009) - Directors Cut.mkv"), b"directors cut").unwrap();
        let result = run_scan(&repo, index_id, &tmp.path().join("Movies"));
        assert_eq!(result.added, 1);

        let movie_path = movie_dir.to_string_lossy().to_string();
        let movies = repo.find_items_by_source_path(index_id, &movie_path).unwrap();
        assert_eq!(movies.len(), 1, "must not create a second movie item for the second edition");

        let default_part = repo.find_part_by_path(&movie_dir.join("Avatar (2009).mkv").to_string_lossy()).unwrap().unwrap();
        let edition_part = repo
            .find_part_by_path(&movie_dir.join("Avatar (2009) - Directors Cut.mkv").to_string_lossy())
            .unwrap()
            .unwrap();
        assert_ne!(
            default_part.version_id, edition_part.version_id,
            "each edition gets its own version"
        );
        let default_version = repo.get_version(default_part.version_id).unwrap().unwrap();
        let edition_version = repo.get_version(edition_part.version_id).unwrap().unwrap();
        assert_eq!(default_version.item_id, movies[0].id);
        assert_eq!(edition_version.item_id, movies[0].id);
        assert_eq!(edition_version.edition.as_deref(), Some("Directors Cut"));
    }

    #[test]
    fn multi_disc_same_edition_coalesces_into_one_version_two_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let movie_dir = tmp.path().join("Movies/Kill Bill (2003)");
        std::fs::create_dir_all(&movie_dir).unwrap();
        std::fs::write(movie_dir.join("Kill Bill (2003) - part 1.mkv"), b"disc one").unwrap();
        std::fs::write(movie_dir.join("Kill Bill (2003) - part 2.mkv"), b"disc two").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let result = run_scan(&repo, index_id, &tmp.path().join("Movies"));
        assert_eq!(result.added, 2);

        let movies = repo.find_items_by_source_path(index_id, &movie_dir.to_string_lossy()).unwrap();
        assert_eq!(movies.len(), 1);

        let part1 = repo.find_part_by_path(&movie_dir.join("Kill Bill (2003) - part 1.mkv").to_string_lossy()).unwrap().unwrap();
        let part2 = repo.find_part_by_path(&movie_dir.join("Kill Bill (2003) - part 2.mkv").to_string_lossy()).unwrap().unwrap();
        assert_eq!(part1.version_id, part2.version_id, "same-edition parts share one version");
        assert_eq!(part1.part_index, Some(1));
        assert_eq!(part2.part_index, Some(2));
    }

    #[test]
    fn s3_moving_into_specials_reassigns_season_and_prunes_old_one() {
        let tmp = tempfile::tempdir().unwrap();
        let show_root = tmp.path().join("TV/Some Show");
        std::fs::create_dir_all(show_root.join("Season 1")).unwrap();
        std::fs::write(show_root.join("Season 1/Some.Show.S01E01.mkv"), b"content").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        run_scan(&repo, index_id, &tmp.path().join("TV"));

        std::fs::create_dir_all(show_root.join("Specials")).unwrap();
        std::fs::rename(
            show_root.join("Season 1/Some.Show.S01E01.mkv"),
            show_root.join("Specials/E01.mkv"),
        )
        .unwrap();
        std::fs::remove_dir(show_root.join("Season 1")).ok();

        run_scan(&repo, index_id, &tmp.path().join("TV"));

        let show_path = show_root.to_string_lossy().to_string();
        let shows = repo.find_items_by_source_path(index_id, &show_path).unwrap();
        assert_eq!(shows.len(), 1, "show must not be duplicated by the move");

        let specials = repo.find_children_by_parent_and_number(shows[0].id, 0).unwrap();
        assert_eq!(specials.len(), 1, "a Specials season (number=0) must exist");

        let old_season = repo.find_children_by_parent_and_number(shows[0].id, 1).unwrap();
        assert!(old_season.is_empty(), "the now-empty season 1 must be pruned");
    }

    #[test]
    fn s4_renaming_show_folder_updates_source_path_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let tv_root = tmp.path().join("TV");
        let show_dir = tv_root.join("Some Show/Season 1");
        std::fs::create_dir_all(&show_dir).unwrap();
        std::fs::write(show_dir.join("Some.Show.S01E01.mkv"), b"content").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        run_scan(&repo, index_id, &tv_root);
        let old_show_path = tv_root.join("Some Show").to_string_lossy().to_string();
        let before = repo.find_items_by_source_path(index_id, &old_show_path).unwrap();
        let show_id = before[0].id;

        let archive_root = tmp.path().join("Archive");
        std::fs::create_dir_all(&archive_root).unwrap();
        std::fs::rename(tv_root.join("Some Show"), archive_root.join("Some Show")).unwrap();

        run_scan(&repo, index_id, &archive_root);

        let moved = repo.get_item(show_id).unwrap().unwrap();
        assert_eq!(
            moved.source_path.as_deref(),
            Some(archive_root.join("Some Show").to_string_lossy().as_ref())
        );

        let parts = repo.find_part_by_path(&archive_root.join("Some Show/Season 1/Some.Show.S01E01.mkv").to_string_lossy()).unwrap();
        assert!(parts.is_some(), "the part's path must also be updated, not just the item");
    }

    #[test]
    fn s5_two_shows_under_shared_non_tracked_parent_stay_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let library = tmp.path().join("Library");
        std::fs::create_dir_all(library.join("Show A")).unwrap();
        std::fs::create_dir_all(library.join("Show B")).unwrap();
        std::fs::write(library.join("Show A/ShowA.S01E01.mkv"), b"a").unwrap();
        std::fs::write(library.join("Show B/ShowB.S01E01.mkv"), b"b").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let result = run_scan(&repo, index_id, &library);
        assert_eq!(result.added, 2);

        let a = repo.find_items_by_source_path(index_id, &library.join("Show A").to_string_lossy()).unwrap();
        let b = repo.find_items_by_source_path(index_id, &library.join("Show B").to_string_lossy()).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn s5_show_nested_inside_another_shows_folder_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let library = tmp.path().join("Library");
        let show_a = library.join("Show A");
        let nested = show_a.join("Nested Show");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(show_a.join("ShowA.S01E01.mkv"), b"a").unwrap();
        std::fs::write(nested.join("NestedShow.S01E01.mkv"), b"n").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let cancel = AtomicBool::new(false);
        let progress = Mutex::new(ScanProgress::default());
        let err = scan_index(&repo, index_id, &[library.clone()], &cancel, &progress).unwrap_err();
        assert!(matches!(err, ScanError::SourcePathConflict { .. }));

        assert!(repo.find_items_by_source_path(index_id, &show_a.to_string_lossy()).unwrap().is_empty());
    }

    #[test]
    fn s6_yearless_movie_with_no_folder_match_falls_back_to_generic() {
        let tmp = tempfile::tempdir().unwrap();
        let movies_root = tmp.path().join("Movies");
        std::fs::create_dir_all(&movies_root).unwrap();
        std::fs::write(movies_root.join("Random.mkv"), b"content").unwrap();

        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let result = run_scan(&repo, index_id, &movies_root);
        assert_eq!(result.added, 1);

        let part = repo.find_part_by_path(&movies_root.join("Random.mkv").to_string_lossy()).unwrap().unwrap();
        let version = repo.get_version(part.version_id).unwrap().unwrap();
        let item = repo.get_item(version.item_id).unwrap().unwrap();
        assert_eq!(item.item_type, ItemType::Video);
        assert!(item.source_path.is_none());
    }

    #[test]
    fn unavailable_root_is_recorded_and_does_not_abort_the_scan() {
        let db = open_in_memory().unwrap();
        let repo = Repository::new(db.clone());
        let index_id: i64 = db
            .lock()
            .unwrap()
            .query_row("INSERT INTO indexes (name, kind) VALUES ('t', 'videos') RETURNING id", [], |r| r.get(0))
            .unwrap();

        let cancel = AtomicBool::new(false);
        let progress = Mutex::new(ScanProgress::default());
        let result = scan_index(&repo, index_id, &[PathBuf::from("/does/not/exist")], &cancel, &progress).unwrap();
        assert_eq!(result.root_outcomes, vec![(PathBuf::from("/does/not/exist"), RootOutcome::Unavailable)]);
    }
}
