use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "market-sync")]
#[command(about = "Market depth sync CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one windowed sync invocation for a shard
    Sync {
        /// Shard number (1-based); falls back to BATCH_NUM, then 1
        #[arg(short, long)]
        shard: Option<u32>,

        /// Items to attempt this run (default derived from the run window)
        #[arg(long)]
        budget: Option<usize>,

        /// Delay between requests in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Backfill missing item name-ids from listing pages
    NameIds {
        /// Items to attempt this run
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Merge shard outputs into the canonical dataset
    Merge {
        /// Directory containing shard output subdirectories
        dir: PathBuf,

        /// Canonical output file (default: <data dir>/items.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Merge key: "identity" or "external-id"
        #[arg(long, default_value = "identity")]
        key: String,

        /// Refuse to write if the merge yields fewer records than this
        #[arg(long)]
        min_records: Option<usize>,
    },
    /// Concatenate shard outputs into latest + timestamped snapshots
    Snapshot,
    /// Query the current price overview for a single item
    Price {
        /// Full item name, e.g. "AK-47 | Redline (Field-Tested)"
        item: String,
    },
    /// Show checkpoint positions and result counts
    Status,
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            shard,
            budget,
            delay_ms,
        } => {
            commands::sync::run(shard, budget, delay_ms);
        }
        Commands::NameIds { budget } => {
            commands::name_ids::run(budget);
        }
        Commands::Merge {
            dir,
            output,
            key,
            min_records,
        } => {
            commands::merge::run(dir, output, key, min_records);
        }
        Commands::Snapshot => {
            commands::snapshot::run();
        }
        Commands::Price { item } => {
            commands::price::run(item);
        }
        Commands::Status => {
            commands::status::run();
        }
    }
}
