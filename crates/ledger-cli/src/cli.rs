use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "ledger-cli")]
pub struct Cli {
    /// Print trace-level logs instead of info-level.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a bucket list through a run of synthetic ledger closes.
    Run {
        /// Directory to store bucket files in (a fresh temp dir if omitted).
        #[clap(long)]
        dir: Option<PathBuf>,
        /// Number of ledgers to close.
        #[clap(long, default_value_t = 1000)]
        ledgers: u64,
        /// Ledger entries touched per ledger close.
        #[clap(long, default_value_t = 20)]
        entries_per_ledger: usize,
        /// Deterministic RNG seed for the synthetic batch generator.
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// Protocol version to close ledgers under.
        #[clap(long, default_value_t = 11)]
        protocol: u32,
        /// Background merge worker count (defaults to logical CPU count).
        #[clap(long)]
        workers: Option<usize>,
        /// Run garbage collection every N ledgers (0 disables it).
        #[clap(long, default_value_t = 100)]
        gc_interval: u64,
        /// Print the final HistoryArchiveState as JSON.
        #[clap(long)]
        print_state: bool,
    },
}
