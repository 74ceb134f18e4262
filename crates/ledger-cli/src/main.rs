use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use ledger_node::{close_ledger, BucketManager, LedgerHeader};
use ledger_store::{HistoryArchiveState, ProtocolVersion};
use tracing::info;

mod batch_gen;
mod cli;
mod log;

use batch_gen::BatchGenerator;
use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    let _guard = log::init_logging(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err:?}");
        exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Run {
            dir,
            ledgers,
            entries_per_ledger,
            seed,
            protocol,
            workers,
            gc_interval,
            print_state,
        } => run_close_loop(
            dir,
            ledgers,
            entries_per_ledger,
            seed,
            protocol,
            workers,
            gc_interval,
            print_state,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_close_loop(
    dir: Option<std::path::PathBuf>,
    ledgers: u64,
    entries_per_ledger: usize,
    seed: u64,
    protocol: u32,
    workers: Option<usize>,
    gc_interval: u64,
    print_state: bool,
) -> Result<()> {
    let tempdir = if dir.is_none() {
        Some(tempfile::tempdir().context("creating scratch bucket directory")?)
    } else {
        None
    };
    let store_dir = dir
        .clone()
        .unwrap_or_else(|| tempdir.as_ref().unwrap().path().to_path_buf());

    let manager = match workers {
        Some(n) => BucketManager::new(&store_dir, n),
        None => BucketManager::with_default_workers(&store_dir),
    }
    .context("initializing bucket manager")?;

    let protocol = ProtocolVersion(protocol);
    let mut list = ledger_store::BucketList::new();
    let mut header = LedgerHeader::genesis();
    let mut generator = BatchGenerator::new(seed);

    info!(?store_dir, ledgers, entries_per_ledger, seed, "starting close loop");

    for seq in 1..=ledgers {
        let (init, live, dead) = generator.next_batch(
            entries_per_ledger,
            protocol.supports_init_and_meta(),
        );
        header = close_ledger(&manager, &mut list, &header, seq, protocol, init, live, dead)
            .with_context(|| format!("closing ledger {seq}"))?;

        if gc_interval != 0 && seq % gc_interval == 0 {
            let collected = manager.forget_unreferenced_buckets();
            info!(seq, collected, interned = manager.interned_len(), "ran gc pass");
        }
    }

    let counters = manager.read_merge_counters();
    info!(
        final_ledger = header.ledger_seq,
        hash = %header.bucket_list_hash,
        finished_merges = counters.finished_merges,
        "close loop complete"
    );

    if print_state {
        let state = HistoryArchiveState::capture(&list, header.ledger_seq, header.skip_list);
        println!("{}", state.to_json().context("serializing archive state")?);
    }

    Ok(())
}
