//! Typed CRUD and hierarchical lookups over the video item/version/part schema.
//!
//! Every public method here is one atomic transaction: the orchestrator and
//! migration engine never see a half-written hierarchy. `latest_added_at`
//! bubble-up and the debug-mode acyclicity check (see `bubble_up` and
//! `assert_acyclic`) run inside the same transaction as the write that
//! triggered them.

use rusqlite::{OptionalExtension, Row, Transaction, params};

use super::DbConn;
use super::schema::{Index, IndexKind, ItemType, ScanStatus, VideoItem, VideoPart, VideoVersion};

/// How many `parent_id` hops the acyclicity check will walk before giving up.
/// Show->season->episode is 2 hops; 8 leaves generous headroom without risking
/// an infinite loop on a real cycle in debug builds.
const MAX_HIERARCHY_DEPTH: usize = 8;

pub struct ShowSpec<'a> {
    pub title: &'a str,
    pub source_path: Option<&'a str>,
}

pub struct SeasonSpec {
    pub number: i32,
}

pub struct EpisodeSpec<'a> {
    pub number: i32,
    pub title: Option<&'a str>,
}

#[derive(Default)]
pub struct VersionAttrs<'a> {
    pub edition: Option<&'a str>,
    pub container: Option<&'a str>,
    pub resolution: Option<&'a str>,
    pub runtime_ms: Option<i64>,
}

/// Fields needed to insert a single `video_parts` row.
pub struct PartAttrs<'a> {
    pub path: &'a str,
    pub size: i64,
    pub mtime: i64,
    pub fast_hash: &'a str,
    pub part_index: Option<i32>,
}

pub struct Repository {
    conn: DbConn,
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<VideoItem> {
    let metadata_text: String = row.get("metadata")?;
    Ok(VideoItem {
        id: row.get("id")?,
        index_id: row.get("index_id")?,
        item_type: ItemType::from_str(row.get::<_, String>("item_type")?.as_str()),
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        sort_title: row.get("sort_title")?,
        year: row.get("year")?,
        number: row.get("number")?,
        source_path: row.get("source_path")?,
        added_at: row.get("added_at")?,
        latest_added_at: row.get("latest_added_at")?,
        metadata: serde_json::from_str(&metadata_text).unwrap_or_default(),
    })
}

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<VideoVersion> {
    let metadata_text: String = row.get("metadata")?;
    Ok(VideoVersion {
        id: row.get("id")?,
        item_id: row.get("item_id")?,
        edition: row.get("edition")?,
        container: row.get("container")?,
        resolution: row.get("resolution")?,
        runtime_ms: row.get("runtime_ms")?,
        metadata: serde_json::from_str(&metadata_text).unwrap_or_default(),
        added_at: row.get("added_at")?,
    })
}

fn row_to_part(row: &Row<'_>) -> rusqlite::Result<VideoPart> {
    Ok(VideoPart {
        id: row.get("id")?,
        version_id: row.get("version_id")?,
        path: row.get("path")?,
        size: row.get("size")?,
        mtime: row.get("mtime")?,
        fast_hash: row.get("fast_hash")?,
        part_index: row.get("part_index")?,
    })
}

fn row_to_index(row: &Row<'_>) -> rusqlite::Result<Index> {
    let roots_text: String = row.get("roots")?;
    Ok(Index {
        id: row.get("id")?,
        name: row.get("name")?,
        kind: IndexKind::from_str(row.get::<_, String>("kind")?.as_str()),
        roots: serde_json::from_str(&roots_text).unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

/// Raise every ancestor of `item_id`'s `latest_added_at` to at least `at`, per
/// invariant 6. Stops as soon as an ancestor is already >= `at` since every
/// ancestor above it is already satisfied transitively.
fn bubble_up(tx: &Transaction<'_>, item_id: i64, at: &str) -> rusqlite::Result<()> {
    let mut current = item_id;
    for _ in 0..MAX_HIERARCHY_DEPTH {
        let parent_id: Option<i64> = tx
            .query_row(
                "SELECT parent_id FROM video_items WHERE id = ?1",
                params![current],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        let updated = tx.execute(
            "UPDATE video_items SET latest_added_at = ?1
             WHERE id = ?2 AND latest_added_at < ?1",
            params![at, parent_id],
        )?;
        if updated == 0 {
            // Ancestor already at or past `at`; everything above it is too.
            return Ok(());
        }
        current = parent_id;
    }
    Ok(())
}

/// Debug-only acyclicity walk: `parent_id` must reach a null within
/// `MAX_HIERARCHY_DEPTH` hops. A freshly resolved ancestor id is never set to a
/// descendant's id, so this should never trip outside a programming error.
#[cfg(debug_assertions)]
fn assert_acyclic(tx: &Transaction<'_>, item_id: i64) -> rusqlite::Result<()> {
    let mut current = item_id;
    for _ in 0..MAX_HIERARCHY_DEPTH {
        let parent_id: Option<i64> = tx
            .query_row(
                "SELECT parent_id FROM video_items WHERE id = ?1",
                params![current],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        match parent_id {
            Some(p) => current = p,
            None => return Ok(()),
        }
    }
    debug_assert!(false, "video_items.parent_id cycle detected at item {item_id}");
    Ok(())
}

#[cfg(not(debug_assertions))]
fn assert_acyclic(_tx: &Transaction<'_>, _item_id: i64) -> rusqlite::Result<()> {
    Ok(())
}

/// Find-or-create the `show` row for `show`, scoped by `source_path` when
/// present or by `(index_id, title)` for a show with none yet.
fn find_or_create_show(tx: &Transaction<'_>, index_id: i64, show: &ShowSpec<'_>) -> rusqlite::Result<i64> {
    match show.source_path {
        Some(source_path) => {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM video_items
                     WHERE index_id = ?1 AND item_type = 'show' AND source_path = ?2",
                    params![index_id, source_path],
                    |r| r.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => Ok(id),
                None => tx.query_row(
                    "INSERT INTO video_items (index_id, item_type, title, source_path)
                     VALUES (?1, 'show', ?2, ?3)
                     RETURNING id",
                    params![index_id, show.title, source_path],
                    |r| r.get(0),
                ),
            }
        }
        None => {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM video_items
                     WHERE index_id = ?1 AND item_type = 'show' AND source_path IS NULL
                           AND title = ?2",
                    params![index_id, show.title],
                    |r| r.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => Ok(id),
                None => tx.query_row(
                    "INSERT INTO video_items (index_id, item_type, title)
                     VALUES (?1, 'show', ?2)
                     RETURNING id",
                    params![index_id, show.title],
                    |r| r.get(0),
                ),
            }
        }
    }
}

/// Find-or-create the `season` then `episode` rows under `show_id`. A season
/// is matched by `(show_id, number)`, an episode by `(season_id, number)` —
/// the same idempotence guarantee `upsert_hierarchy` promises.
fn find_or_create_season_episode(
    tx: &Transaction<'_>,
    index_id: i64,
    show_id: i64,
    season: &SeasonSpec,
    episode: &EpisodeSpec<'_>,
) -> rusqlite::Result<i64> {
    let season_title = if season.number == 0 {
        "Specials".to_string()
    } else {
        format!("Season {}", season.number)
    };
    let season_id: i64 = tx
        .query_row(
            "SELECT id FROM video_items WHERE parent_id = ?1 AND number = ?2",
            params![show_id, season.number],
            |r| r.get(0),
        )
        .optional()?
        .map(Ok)
        .unwrap_or_else(|| {
            tx.query_row(
                "INSERT INTO video_items (index_id, item_type, parent_id, title, number)
                 VALUES (?1, 'season', ?2, ?3, ?4)
                 RETURNING id",
                params![index_id, show_id, season_title, season.number],
                |r| r.get(0),
            )
        })?;

    let episode_title = episode
        .title
        .map(str::to_string)
        .unwrap_or_else(|| format!("Episode {}", episode.number));
    tx.query_row(
        "SELECT id FROM video_items WHERE parent_id = ?1 AND number = ?2",
        params![season_id, episode.number],
        |r| r.get(0),
    )
    .optional()?
    .map(Ok)
    .unwrap_or_else(|| {
        tx.query_row(
            "INSERT INTO video_items (index_id, item_type, parent_id, title, number)
             VALUES (?1, 'episode', ?2, ?3, ?4)
             RETURNING id",
            params![index_id, season_id, episode_title, episode.number],
            |r| r.get(0),
        )
    })
}

/// Find-or-create the `movie` row matched by `source_path` when present, or by
/// `(index_id, title, year)` for a loose movie with none yet.
fn find_or_create_movie(
    tx: &Transaction<'_>,
    index_id: i64,
    source_path: Option<&str>,
    title: &str,
    year: Option<i32>,
) -> rusqlite::Result<i64> {
    let existing: Option<i64> = match source_path {
        Some(source_path) => tx
            .query_row(
                "SELECT id FROM video_items
                 WHERE index_id = ?1 AND item_type = 'movie' AND source_path = ?2",
                params![index_id, source_path],
                |r| r.get(0),
            )
            .optional()?,
        None => tx
            .query_row(
                "SELECT id FROM video_items
                 WHERE index_id = ?1 AND item_type = 'movie' AND source_path IS NULL
                       AND title = ?2 AND year IS ?3",
                params![index_id, title, year],
                |r| r.get(0),
            )
            .optional()?,
    };
    match existing {
        Some(id) => Ok(id),
        None => tx.query_row(
            "INSERT INTO video_items (index_id, item_type, title, year, source_path)
             VALUES (?1, 'movie', ?2, ?3, ?4)
             RETURNING id",
            params![index_id, title, year, source_path],
            |r| r.get(0),
        ),
    }
}

/// Find-or-create the `video_versions` row for `item_id` matched by `edition`
/// (NULL-safe, so an unedited version and an `{edition-...}` version never
/// collide). This is what keeps a multi-part release — `part 1`, `part 2` of
/// the same cut — as one version with several parts instead of minting a new
/// version per staged file.
fn find_or_create_version(tx: &Transaction<'_>, item_id: i64, attrs: &VersionAttrs<'_>) -> rusqlite::Result<i64> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM video_versions WHERE item_id = ?1 AND edition IS ?2",
            params![item_id, attrs.edition],
            |r| r.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => Ok(id),
        None => tx.query_row(
            "INSERT INTO video_versions (item_id, edition, container, resolution, runtime_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![item_id, attrs.edition, attrs.container, attrs.resolution, attrs.runtime_ms],
            |r| r.get(0),
        ),
    }
}

fn insert_part_row(tx: &Transaction<'_>, version_id: i64, part: &PartAttrs<'_>) -> rusqlite::Result<i64> {
    tx.query_row(
        "INSERT INTO video_parts (version_id, path, size, mtime, fast_hash, part_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id",
        params![version_id, part.path, part.size, part.mtime, part.fast_hash, part.part_index],
        |r| r.get(0),
    )
}

fn create_leaf_item_row(tx: &Transaction<'_>, index_id: i64, item_type: ItemType, title: &str) -> rusqlite::Result<i64> {
    tx.query_row(
        "INSERT INTO video_items (index_id, item_type, title)
         VALUES (?1, ?2, ?3)
         RETURNING id",
        params![index_id, item_type.as_str(), title],
        |r| r.get(0),
    )
}

fn create_extra_item_row(
    tx: &Transaction<'_>,
    index_id: i64,
    title: &str,
    extra_kind: &str,
    parent_source_path: Option<&str>,
) -> rusqlite::Result<i64> {
    let metadata = serde_json::json!({
        "extra_kind": extra_kind,
        "parent_source_path": parent_source_path,
    })
    .to_string();
    tx.query_row(
        "INSERT INTO video_items (index_id, item_type, title, metadata)
         VALUES (?1, 'extra', ?2, ?3)
         RETURNING id",
        params![index_id, title, metadata],
        |r| r.get(0),
    )
}

impl Repository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn find_part_by_identity(&self, size: i64, fast_hash: &str) -> rusqlite::Result<Vec<VideoPart>> {
        let db = self.conn.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, version_id, path, size, mtime, fast_hash, part_index
             FROM video_parts WHERE size = ?1 AND fast_hash = ?2",
        )?;
        let rows = stmt.query_map(params![size, fast_hash], row_to_part)?;
        rows.collect()
    }

    pub fn find_part_by_path(&self, path: &str) -> rusqlite::Result<Option<VideoPart>> {
        let db = self.conn.lock().unwrap();
        db.query_row(
            "SELECT id, version_id, path, size, mtime, fast_hash, part_index
             FROM video_parts WHERE path = ?1",
            params![path],
            row_to_part,
        )
        .optional()
    }

    pub fn get_item(&self, item_id: i64) -> rusqlite::Result<Option<VideoItem>> {
        let db = self.conn.lock().unwrap();
        db.query_row(
            "SELECT id, index_id, item_type, parent_id, title, sort_title, year, number,
                    source_path, added_at, latest_added_at, metadata
             FROM video_items WHERE id = ?1",
            params![item_id],
            row_to_item,
        )
        .optional()
    }

    pub fn get_version(&self, version_id: i64) -> rusqlite::Result<Option<VideoVersion>> {
        let db = self.conn.lock().unwrap();
        db.query_row(
            "SELECT id, item_id, edition, container, resolution, runtime_ms, metadata, added_at
             FROM video_versions WHERE id = ?1",
            params![version_id],
            row_to_version,
        )
        .optional()
    }

    pub fn find_items_by_source_path(&self, index_id: i64, source_path: &str) -> rusqlite::Result<Vec<VideoItem>> {
        let db = self.conn.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, index_id, item_type, parent_id, title, sort_title, year, number,
                    source_path, added_at, latest_added_at, metadata
             FROM video_items WHERE index_id = ?1 AND source_path = ?2",
        )?;
        let rows = stmt.query_map(params![index_id, source_path], row_to_item)?;
        rows.collect()
    }

    pub fn find_children_by_parent_and_number(&self, parent_id: i64, number: i32) -> rusqlite::Result<Vec<VideoItem>> {
        let db = self.conn.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, index_id, item_type, parent_id, title, sort_title, year, number,
                    source_path, added_at, latest_added_at, metadata
             FROM video_items WHERE parent_id = ?1 AND number = ?2",
        )?;
        let rows = stmt.query_map(params![parent_id, number], row_to_item)?;
        rows.collect()
    }

    /// Walk `item_id`'s ancestor chain (inclusive) up to the nearest `show` or
    /// `movie`, the only types that carry a meaningful `source_path`. Returns
    /// `None` for an item with no such ancestor (e.g. a generic `video` or a
    /// flat `extra`).
    pub fn find_owning_container(&self, item_id: i64) -> rusqlite::Result<Option<VideoItem>> {
        let mut current = self.get_item(item_id)?;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            match current {
                Some(item) if matches!(item.item_type, ItemType::Show | ItemType::Movie) => {
                    return Ok(Some(item));
                }
                Some(item) => match item.parent_id {
                    Some(parent_id) => current = self.get_item(parent_id)?,
                    None => return Ok(None),
                },
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Flush-scoped: walk-or-create show -> season -> episode, find-or-create
    /// the version by `edition`, and attach `part` to it — all inside one
    /// transaction. No intermediate commit ever leaves an episode with zero
    /// versions or a version with zero parts.
    pub fn place_tv_part(
        &self,
        index_id: i64,
        show: ShowSpec<'_>,
        season: SeasonSpec,
        episode: EpisodeSpec<'_>,
        version: VersionAttrs<'_>,
        part: PartAttrs<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let show_id = find_or_create_show(&tx, index_id, &show)?;
        let episode_id = find_or_create_season_episode(&tx, index_id, show_id, &season, &episode)?;
        let version_id = find_or_create_version(&tx, episode_id, &version)?;
        let part_id = insert_part_row(&tx, version_id, &part)?;

        bubble_up(&tx, episode_id, &now(&tx)?)?;
        assert_acyclic(&tx, episode_id)?;
        tx.commit()?;
        Ok(part_id)
    }

    /// Flush-scoped: find-or-create the movie item, find-or-create the version
    /// by `edition`, and attach `part` to it — all inside one transaction. The
    /// same movie folder scanned twice with a second edition adds a version to
    /// the existing item instead of a second movie.
    pub fn place_movie_part(
        &self,
        index_id: i64,
        source_path: Option<&str>,
        title: &str,
        year: Option<i32>,
        version: VersionAttrs<'_>,
        part: PartAttrs<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let item_id = find_or_create_movie(&tx, index_id, source_path, title, year)?;
        let version_id = find_or_create_version(&tx, item_id, &version)?;
        let part_id = insert_part_row(&tx, version_id, &part)?;

        bubble_up(&tx, item_id, &now(&tx)?)?;
        assert_acyclic(&tx, item_id)?;
        tx.commit()?;
        Ok(part_id)
    }

    /// Flush-scoped: create a root-level `item_type` item (generic `video`)
    /// with a single version and part, all inside one transaction.
    pub fn place_leaf_part(
        &self,
        index_id: i64,
        item_type: ItemType,
        title: &str,
        part: PartAttrs<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let item_id = create_leaf_item_row(&tx, index_id, item_type, title)?;
        let version_id = find_or_create_version(&tx, item_id, &VersionAttrs::default())?;
        let part_id = insert_part_row(&tx, version_id, &part)?;

        bubble_up(&tx, item_id, &now(&tx)?)?;
        tx.commit()?;
        Ok(part_id)
    }

    /// Flush-scoped: create an `extra` item — flat under the index, with
    /// `parent_source_path` stashed in `metadata` rather than a real
    /// `parent_id` (see DESIGN.md) — with a single version and part, all
    /// inside one transaction.
    pub fn place_extra_part(
        &self,
        index_id: i64,
        title: &str,
        extra_kind: &str,
        parent_source_path: Option<&str>,
        part: PartAttrs<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let item_id = create_extra_item_row(&tx, index_id, title, extra_kind, parent_source_path)?;
        let version_id = find_or_create_version(&tx, item_id, &VersionAttrs::default())?;
        let part_id = insert_part_row(&tx, version_id, &part)?;

        bubble_up(&tx, item_id, &now(&tx)?)?;
        tx.commit()?;
        Ok(part_id)
    }

    /// Idempotent walk-or-create of show -> season -> episode. Never creates
    /// duplicate siblings: a season is looked up by `(show_id, number)`, an
    /// episode by `(season_id, number)`, before either is inserted.
    pub fn upsert_hierarchy(
        &self,
        index_id: i64,
        show: ShowSpec<'_>,
        season: SeasonSpec,
        episode: EpisodeSpec<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let show_id = find_or_create_show(&tx, index_id, &show)?;
        let episode_id = find_or_create_season_episode(&tx, index_id, show_id, &season, &episode)?;

        bubble_up(&tx, episode_id, &now(&tx)?)?;
        assert_acyclic(&tx, episode_id)?;
        tx.commit()?;
        Ok(episode_id)
    }

    /// Like [`Self::upsert_hierarchy`], but for when the show already has a
    /// known `item_id` (the migration engine's Merge/Split/Move scenarios,
    /// where the destination show was just resolved or created). Walks or
    /// creates only the season/episode levels underneath it.
    pub fn upsert_episode_under_show(
        &self,
        index_id: i64,
        show_id: i64,
        season: SeasonSpec,
        episode: EpisodeSpec<'_>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let episode_id = find_or_create_season_episode(&tx, index_id, show_id, &season, &episode)?;

        bubble_up(&tx, episode_id, &now(&tx)?)?;
        assert_acyclic(&tx, episode_id)?;
        tx.commit()?;
        Ok(episode_id)
    }

    /// Create a root-level container item (`show` or `movie`) with a
    /// `source_path`, used by the migration engine's Split scenario when a
    /// moved part's new location has no existing owner yet.
    pub fn create_container_item(
        &self,
        index_id: i64,
        item_type: ItemType,
        title: &str,
        source_path: &str,
    ) -> rusqlite::Result<i64> {
        let db = self.conn.lock().unwrap();
        db.query_row(
            "INSERT INTO video_items (index_id, item_type, title, source_path)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
            params![index_id, item_type.as_str(), title, source_path],
            |r| r.get(0),
        )
    }

    pub fn create_version(&self, item_id: i64, attrs: VersionAttrs<'_>) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;
        let version_id: i64 = tx.query_row(
            "INSERT INTO video_versions (item_id, edition, container, resolution, runtime_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![item_id, attrs.edition, attrs.container, attrs.resolution, attrs.runtime_ms],
            |r| r.get(0),
        )?;
        bubble_up(&tx, item_id, &now(&tx)?)?;
        tx.commit()?;
        Ok(version_id)
    }

    pub fn create_part(
        &self,
        version_id: i64,
        path: &str,
        size: i64,
        mtime: i64,
        fast_hash: &str,
        part_index: Option<i32>,
    ) -> rusqlite::Result<i64> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;
        let part_id: i64 = tx.query_row(
            "INSERT INTO video_parts (version_id, path, size, mtime, fast_hash, part_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id",
            params![version_id, path, size, mtime, fast_hash, part_index],
            |r| r.get(0),
        )?;
        let item_id: Option<i64> = tx
            .query_row(
                "SELECT item_id FROM video_versions WHERE id = ?1",
                params![version_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(item_id) = item_id {
            bubble_up(&tx, item_id, &now(&tx)?)?;
        }
        tx.commit()?;
        Ok(part_id)
    }

    pub fn update_part_path(&self, part_id: i64, new_path: &str, new_mtime: i64) -> rusqlite::Result<()> {
        let db = self.conn.lock().unwrap();
        db.execute(
            "UPDATE video_parts SET path = ?1, mtime = ?2 WHERE id = ?3",
            params![new_path, new_mtime, part_id],
        )?;
        Ok(())
    }

    pub fn update_item_source_path(&self, item_id: i64, new_source_path: &str) -> rusqlite::Result<()> {
        let db = self.conn.lock().unwrap();
        db.execute(
            "UPDATE video_items SET source_path = ?1 WHERE id = ?2",
            params![new_source_path, item_id],
        )?;
        Ok(())
    }

    /// Move `part_id` from its current version/item onto `to_item_id`. If the
    /// part's version carries other parts, a new single-part version is split
    /// off onto the destination; otherwise the whole version is reparented.
    /// Deletes the source version/item afterwards if left empty.
    pub fn reparent_part(&self, part_id: i64, to_item_id: i64) -> rusqlite::Result<()> {
        let mut db = self.conn.lock().unwrap();
        let tx = db.transaction()?;

        let (version_id, from_item_id): (i64, i64) = tx.query_row(
            "SELECT vp.version_id, vv.item_id
             FROM video_parts vp JOIN video_versions vv ON vv.id = vp.version_id
             WHERE vp.id = ?1",
            params![part_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let sibling_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM video_parts WHERE version_id = ?1",
            params![version_id],
            |r| r.get(0),
        )?;

        if sibling_count > 1 {
            let source_version: VideoVersion = tx.query_row(
                "SELECT id, item_id, edition, container, resolution, runtime_ms, metadata, added_at
                 FROM video_versions WHERE id = ?1",
                params![version_id],
                row_to_version,
            )?;
            let new_version_id: i64 = tx.query_row(
                "INSERT INTO video_versions (item_id, edition, container, resolution, runtime_ms, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
                params![
                    to_item_id,
                    source_version.edition,
                    source_version.container,
                    source_version.resolution,
                    source_version.runtime_ms,
                    serde_json::to_string(&source_version.metadata).unwrap_or_default(),
                ],
                |r| r.get(0),
            )?;
            tx.execute(
                "UPDATE video_parts SET version_id = ?1 WHERE id = ?2",
                params![new_version_id, part_id],
            )?;
        } else {
            tx.execute(
                "UPDATE video_versions SET item_id = ?1 WHERE id = ?2",
                params![to_item_id, version_id],
            )?;
        }

        bubble_up(&tx, to_item_id, &now(&tx)?)?;
        assert_acyclic(&tx, to_item_id)?;
        tx.commit()?;
        drop(db);

        self.delete_item_if_empty(from_item_id)?;
        Ok(())
    }

    /// Recursively prune `item_id` and its ancestors if they're left with no
    /// children and no versions, walking up from a leaf through `parent_id`
    /// until a non-empty ancestor (or the top of the tree) is reached. A show
    /// or season that loses its last child this way is pruned along with it;
    /// invariant 2 only protects them from this during an in-progress scan,
    /// not after a migration permanently empties them.
    pub fn delete_item_if_empty(&self, item_id: i64) -> rusqlite::Result<()> {
        let db = self.conn.lock().unwrap();
        let mut current = Some(item_id);
        for _ in 0..MAX_HIERARCHY_DEPTH {
            let Some(id) = current else { break };
            let child_count: i64 = db.query_row(
                "SELECT COUNT(*) FROM video_items WHERE parent_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            let version_count: i64 = db.query_row(
                "SELECT COUNT(*) FROM video_versions WHERE item_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if child_count > 0 || version_count > 0 {
                break;
            }
            let parent_id: Option<i64> = db
                .query_row(
                    "SELECT parent_id FROM video_items WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();
            db.execute("DELETE FROM video_items WHERE id = ?1", params![id])?;
            current = parent_id;
        }
        Ok(())
    }

    /// Register a new index from a list of absolute root folder paths: naming
    /// and root selection are an external concern, the scanner only needs the
    /// result.
    pub fn create_index(&self, name: &str, kind: IndexKind, roots: &[String]) -> rusqlite::Result<i64> {
        let db = self.conn.lock().unwrap();
        let roots_json = serde_json::to_string(roots).unwrap_or_else(|_| "[]".to_string());
        db.query_row(
            "INSERT INTO indexes (name, kind, roots) VALUES (?1, ?2, ?3) RETURNING id",
            params![name, kind.as_str(), roots_json],
            |r| r.get(0),
        )
    }

    pub fn get_index(&self, index_id: i64) -> rusqlite::Result<Option<Index>> {
        let db = self.conn.lock().unwrap();
        db.query_row(
            "SELECT id, name, kind, roots, created_at FROM indexes WHERE id = ?1",
            params![index_id],
            row_to_index,
        )
        .optional()
    }

    pub fn list_indexes(&self) -> rusqlite::Result<Vec<Index>> {
        let db = self.conn.lock().unwrap();
        let mut stmt = db.prepare("SELECT id, name, kind, roots, created_at FROM indexes ORDER BY id")?;
        let rows = stmt.query_map([], row_to_index)?;
        rows.collect()
    }

    /// Current persisted scan status for `index_id`, `idle` if no job row
    /// exists yet (a freshly created index has never been scanned).
    pub fn get_job_status(&self, index_id: i64) -> rusqlite::Result<ScanStatus> {
        let db = self.conn.lock().unwrap();
        let status: Option<String> = db
            .query_row("SELECT status FROM scan_jobs WHERE index_id = ?1", params![index_id], |r| r.get(0))
            .optional()?;
        Ok(status.map(|s| ScanStatus::from_str(&s)).unwrap_or_default())
    }

    pub fn set_job_status(&self, index_id: i64, status: ScanStatus) -> rusqlite::Result<()> {
        let db = self.conn.lock().unwrap();
        let existing: Option<i64> = db
            .query_row(
                "SELECT id FROM scan_jobs WHERE index_id = ?1",
                params![index_id],
                |r| r.get(0),
            )
            .optional()?;
        match existing {
            Some(job_id) => {
                db.execute(
                    "UPDATE scan_jobs SET status = ?1,
                        started_at = CASE WHEN ?1 = 'scanning' THEN datetime('now') ELSE started_at END,
                        finished_at = CASE WHEN ?1 = 'idle' THEN datetime('now') ELSE finished_at END
                     WHERE id = ?2",
                    params![status.as_str(), job_id],
                )?;
            }
            None => {
                db.execute(
                    "INSERT INTO scan_jobs (index_id, status) VALUES (?1, ?2)",
                    params![index_id, status.as_str()],
                )?;
            }
        }
        Ok(())
    }

    /// Coerce any job left in `scanning` back to `queued`. Called once at host
    /// startup: a process restart means every in-flight scan crashed mid-walk.
    pub fn reset_scanning_jobs_to_queued(&self) -> rusqlite::Result<usize> {
        let db = self.conn.lock().unwrap();
        db.execute(
            "UPDATE scan_jobs SET status = 'queued' WHERE status = 'scanning'",
            [],
        )
    }
}

fn now(tx: &Transaction<'_>) -> rusqlite::Result<String> {
    tx.query_row("SELECT datetime('now')", [], |r| r.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn new_index(repo: &Repository) -> i64 {
        let db = repo.conn.lock().unwrap();
        let id = db
            .query_row(
                "INSERT INTO indexes (name, kind) VALUES ('test', 'videos') RETURNING id",
                [],
                |r| r.get(0),
            )
            .unwrap();
        id
    }

    #[test]
    fn upsert_hierarchy_is_idempotent() {
        let repo = Repository::new(open_in_memory().unwrap());
        let index_id = new_index(&repo);

        let id1 = repo
            .upsert_hierarchy(
                index_id,
                ShowSpec { title: "Some Show", source_path: Some("/root/TV/Some Show") },
                SeasonSpec { number: 1 },
                EpisodeSpec { number: 1, title: None },
            )
            .unwrap();
        let id2 = repo
            .upsert_hierarchy(
                index_id,
                ShowSpec { title: "Some Show", source_path: Some("/root/TV/Some Show") },
                SeasonSpec { number: 1 },
                EpisodeSpec { number: 1, title: None },
            )
            .unwrap();
        assert_eq!(id1, id2);

        let shows = repo.find_items_by_source_path(index_id, "/root/TV/Some Show").unwrap();
        assert_eq!(shows.len(), 1);
    }

    #[test]
    fn bubble_up_raises_ancestors() {
        let repo = Repository::new(open_in_memory().unwrap());
        let index_id = new_index(&repo);
        let episode_id = repo
            .upsert_hierarchy(
                index_id,
                ShowSpec { title: "Show", source_path: Some("/a/Show") },
                SeasonSpec { number: 1 },
                EpisodeSpec { number: 1, title: None },
            )
            .unwrap();
        let episode = repo.get_item(episode_id).unwrap().unwrap();
        let season = repo.get_item(episode.parent_id.unwrap()).unwrap().unwrap();
        let show = repo.get_item(season.parent_id.unwrap()).unwrap().unwrap();
        assert!(show.latest_added_at >= episode.added_at);
        assert!(season.latest_added_at >= episode.added_at);
    }

    #[test]
    fn delete_item_if_empty_prunes_chain() {
        let repo = Repository::new(open_in_memory().unwrap());
        let index_id = new_index(&repo);
        let episode_id = repo
            .upsert_hierarchy(
                index_id,
                ShowSpec { title: "Show", source_path: Some("/a/Show") },
                SeasonSpec { number: 1 },
                EpisodeSpec { number: 1, title: None },
            )
            .unwrap();
        let version_id = repo.create_version(episode_id, VersionAttrs::default()).unwrap();
        let part_id = repo
            .create_part(version_id, "/a/Show/Season 1/e01.mkv", 10, 0, "abc", None)
            .unwrap();

        let db = repo.conn.lock().unwrap();
        db.execute("DELETE FROM video_parts WHERE id = ?1", params![part_id]).unwrap();
        db.execute("DELETE FROM video_versions WHERE id = ?1", params![version_id]).unwrap();
        drop(db);

        repo.delete_item_if_empty(episode_id).unwrap();
        assert!(repo.get_item(episode_id).unwrap().is_none());
    }
}
