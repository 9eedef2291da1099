//! Where the scanner's database file and log level come from: a plain
//! env-var-with-fallback resolution, no config file parsing.

use std::path::PathBuf;

/// `REELSHELF_DATA_DIR` overrides where the SQLite file lives; defaults to
/// `./data/reelshelf.db`.
pub fn database_path() -> PathBuf {
    crate::db::db_path()
}

/// Install a `tracing` subscriber honoring `REELSHELF_LOG` (standard
/// `tracing_subscriber::EnvFilter` syntax, e.g. `reelshelf=debug`), falling
/// back to `info`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("REELSHELF_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
