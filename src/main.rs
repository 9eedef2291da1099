mod classifier;
mod config;
mod control;
mod db;
mod error;
mod fs_probe;
mod migration;
mod orchestrator;
mod staging;
mod tracker;

use clap::{Parser, Subcommand};
use tracing::error;

use control::ScanService;
use db::repository::Repository;
use db::schema::IndexKind;

#[derive(Parser)]
#[command(name = "reelshelf", about = "Video library scanner for a personal media server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new index over one or more root folders.
    AddIndex {
        /// Display name for the index.
        name: String,
        /// Kind of media this index holds.
        #[arg(long, value_enum, default_value = "videos")]
        kind: CliIndexKind,
        /// Root folders to scan, in priority order.
        #[arg(required = true)]
        roots: Vec<String>,
    },
    /// List every registered index.
    ListIndexes,
    /// Run a scan of an index to completion.
    Scan {
        index_id: i64,
    },
    /// Request cancellation of an index's in-flight scan.
    Cancel {
        index_id: i64,
    },
    /// Report an index's persisted status and live progress.
    Status {
        index_id: i64,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum CliIndexKind {
    Videos,
    Photos,
    Audio,
}

impl From<CliIndexKind> for IndexKind {
    fn from(k: CliIndexKind) -> Self {
        match k {
            CliIndexKind::Videos => IndexKind::Videos,
            CliIndexKind::Photos => IndexKind::Photos,
            CliIndexKind::Audio => IndexKind::Audio,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();
    let cli = Cli::parse();

    let db = db::open_database(&config::database_path())?;
    let repo = Repository::new(db.clone());

    match cli.command {
        Command::AddIndex { name, kind, roots } => {
            let index_id = repo.create_index(&name, kind.into(), &roots)?;
            println!("created index {index_id} ({name})");
        }
        Command::ListIndexes => {
            for index in repo.list_indexes()? {
                println!("{}\t{}\t{}\t{:?}", index.id, index.name, index.kind, index.roots);
            }
        }
        Command::Scan { index_id } => {
            let service = ScanService::new(db);
            match service.scan(index_id).await {
                Ok(result) => {
                    println!(
                        "added={} updated={} migrated={} skipped={}",
                        result.added, result.updated, result.migrated, result.skipped
                    );
                    for (root, outcome) in &result.root_outcomes {
                        println!("{}: {:?}", root.display(), outcome);
                    }
                }
                Err(e) => {
                    error!(index_id, error = %e, "scan failed");
                    std::process::exit(1);
                }
            }
        }
        Command::Cancel { index_id } => {
            let service = ScanService::new(db);
            service.cancel(index_id);
            println!("cancel requested for index {index_id}");
        }
        Command::Status { index_id } => {
            let service = ScanService::new(db);
            let status = service.status(index_id).await?;
            println!("status: {}", status.status);
            println!(
                "files_seen={} movies={} tv_episodes={} extras={} generic={} items_flushed={} roots={}/{}",
                status.progress.files_seen,
                status.progress.movies_seen,
                status.progress.tv_episodes_seen,
                status.progress.extras_seen,
                status.progress.generic_seen,
                status.progress.items_flushed,
                status.progress.roots_done,
                status.progress.roots_total,
            );
        }
    }

    Ok(())
}
