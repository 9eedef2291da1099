pub mod repository;
pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub type DbConn = Arc<Mutex<Connection>>;

/// Get the database file path. Uses `REELSHELF_DATA_DIR` if set, else `./data/`.
pub fn db_path() -> PathBuf {
    if let Ok(dir) = std::env::var("REELSHELF_DATA_DIR") {
        PathBuf::from(dir).join("reelshelf.db")
    } else {
        PathBuf::from("data").join("reelshelf.db")
    }
}

/// Open (or create) the database and run initialization.
pub fn open_database(path: &Path) -> Result<DbConn, rusqlite::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;",
    )?;

    initialize_database(&conn)?;

    info!("database opened at {}", path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// Open an in-memory database, for tests.
pub fn open_in_memory() -> Result<DbConn, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    initialize_database(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create all tables, indexes and foreign keys. Idempotent.
fn initialize_database(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS indexes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'videos',
            roots       TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS video_items (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            index_id          INTEGER NOT NULL REFERENCES indexes(id) ON DELETE CASCADE,
            item_type         TEXT NOT NULL,
            parent_id         INTEGER REFERENCES video_items(id) ON DELETE CASCADE,
            title             TEXT NOT NULL,
            sort_title        TEXT,
            year              INTEGER,
            number            INTEGER,
            source_path       TEXT,
            added_at          TEXT NOT NULL DEFAULT (datetime('now')),
            latest_added_at   TEXT NOT NULL DEFAULT (datetime('now')),
            metadata          TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS video_versions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id     INTEGER NOT NULL REFERENCES video_items(id) ON DELETE CASCADE,
            edition     TEXT,
            container   TEXT,
            resolution  TEXT,
            runtime_ms  INTEGER,
            metadata    TEXT NOT NULL DEFAULT '{}',
            added_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS video_parts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id  INTEGER NOT NULL REFERENCES video_versions(id) ON DELETE CASCADE,
            path        TEXT NOT NULL UNIQUE,
            size        INTEGER NOT NULL,
            mtime       INTEGER NOT NULL,
            fast_hash   TEXT NOT NULL,
            part_index  INTEGER
        );

        CREATE TABLE IF NOT EXISTS scan_jobs (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            index_id     INTEGER NOT NULL REFERENCES indexes(id) ON DELETE CASCADE,
            status       TEXT NOT NULL DEFAULT 'idle',
            started_at   TEXT,
            finished_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_video_parts_identity
            ON video_parts (size, fast_hash);

        CREATE INDEX IF NOT EXISTS idx_video_items_source_path
            ON video_items (index_id, source_path);

        CREATE INDEX IF NOT EXISTS idx_video_items_parent
            ON video_items (parent_id);

        CREATE INDEX IF NOT EXISTS idx_video_versions_item
            ON video_versions (item_id);

        CREATE INDEX IF NOT EXISTS idx_video_parts_version
            ON video_parts (version_id);
        ",
    )?;

    info!("database initialized");
    Ok(())
}
