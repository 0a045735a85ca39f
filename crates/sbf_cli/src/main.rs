use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use sbf_core::{consts, AddOutcome, SbfParams, SbfStore};

#[derive(Parser)]
#[command(name = "sbf", about = "Scalable bloom filter store: core ops")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a new store
    Init {
        #[arg(long)]
        dir: PathBuf,
        /// Capacity of the first filter
        #[arg(long, default_value_t = consts::DEFAULT_INITIAL_CAPACITY)]
        capacity: u64,
        /// False-positive probability of the first filter
        #[arg(long, default_value_t = consts::DEFAULT_FP_PROBABILITY)]
        prob: f64,
        /// Capacity multiplier per new filter
        #[arg(long, default_value_t = consts::DEFAULT_SCALE_SIZE)]
        scale: u32,
        /// Probability multiplier per new filter
        #[arg(long, default_value_t = consts::DEFAULT_PROBABILITY_REDUCTION)]
        reduction: f64,
    },

    /// Add keys
    Add {
        #[arg(long)]
        dir: PathBuf,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Test keys for membership
    Check {
        #[arg(long)]
        dir: PathBuf,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Add every line of a file as a key
    Load {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        file: PathBuf,
    },

    Info {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn open_store(dir: &Path) -> Result<SbfStore> {
    SbfStore::open(dir).with_context(|| format!("open store at {}", dir.display()))
}

/// Runs `body` against the store at `dir`, closing the store on every path.
/// An error from `body` takes precedence over one from the close.
fn with_store<T>(dir: &Path, body: impl FnOnce(&mut SbfStore) -> Result<T>) -> Result<T> {
    let mut store = open_store(dir)?;
    let out = body(&mut store);
    let closed = store.close().with_context(|| format!("close store at {}", dir.display()));
    let out = out?;
    closed?;
    Ok(out)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { dir, capacity, prob, scale, reduction } => {
            let params = SbfParams {
                initial_capacity: capacity,
                fp_probability: prob,
                scale_size: scale,
                probability_reduction: reduction,
            };
            let store = SbfStore::create(&dir, params)
                .with_context(|| format!("create store at {}", dir.display()))?;
            store.close()?;
            println!("init: {}", dir.display());
        }
        Cmd::Add { dir, keys } => with_store(&dir, |store| {
            for k in &keys {
                let word = match store.add(k.as_bytes())? {
                    AddOutcome::Added => "added",
                    AddOutcome::AlreadyPresent => "present",
                };
                println!("{k}: {word}");
            }
            Ok(())
        })?,
        Cmd::Check { dir, keys } => with_store(&dir, |store| {
            for k in &keys {
                let word = if store.contains(k.as_bytes()) { "yes" } else { "no" };
                println!("{k}: {word}");
            }
            Ok(())
        })?,
        Cmd::Load { dir, file } => {
            let (read, added, filters) = with_store(&dir, |store| {
                let f = File::open(&file).with_context(|| format!("open {}", file.display()))?;
                let (mut read, mut added) = (0u64, 0u64);
                // keys are raw bytes; a line need not be UTF-8
                for line in BufReader::new(f).split(b'\n') {
                    let mut line = line.with_context(|| format!("read {}", file.display()))?;
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.is_empty() {
                        continue;
                    }
                    read += 1;
                    let outcome = store
                        .add(&line)
                        .with_context(|| format!("add key {read} of {}", file.display()))?;
                    if outcome == AddOutcome::Added {
                        added += 1;
                    }
                }
                Ok((read, added, store.filter().filter_count()))
            })?;
            let present = read - added;
            println!("load: read={read} added={added} present={present} filters={filters}");
        }
        Cmd::Info { dir } => with_store(&dir, |store| {
            let p = store.manifest().params;
            println!("dir: {}", dir.display());
            println!(
                "params: initial_capacity={} fp_probability={} scale_size={} \
                 probability_reduction={}",
                p.initial_capacity, p.fp_probability, p.scale_size, p.probability_reduction
            );
            let chain = store.filter();
            println!("filters: {}", chain.filter_count());
            let records = store.manifest().filters.iter();
            for (i, (rec, f)) in records.zip(chain.filters()).enumerate() {
                println!(
                    "  #{i} {}  capacity={} fp={} k={} bytes={} est={}",
                    rec.path.display(),
                    rec.capacity,
                    rec.fp_probability,
                    f.k(),
                    f.byte_size(),
                    f.estimated_count()
                );
            }
            println!(
                "size≈{} capacity={} bytes={}",
                store.size(),
                store.capacity(),
                store.byte_size()
            );
            Ok(())
        })?,
    }
    Ok(())
}
