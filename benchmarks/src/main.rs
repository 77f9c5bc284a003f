// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use hashdist::{
    EngineConfig, Evaluator, HashFunction, Mode, RandomBlocks, WordsParameters,
};
use hashdist_benchmarks::{
    algo::{catalog, Family, ALL_FAMILIES},
    sink::FileSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const RESULT_DIR: &str = "results";

const NORMAL_DISTRIBUTION_BITS: [u32; 2] = [16, 24];
const BINS_DISTRIBUTION_BITS: [u32; 2] = [32, 64];
const MASK_DISTRIBUTION_BITS: [u32; 2] = [32, 64];
const MASK_DISTRIBUTION_WINDOW: u32 = 24;
const NORMAL_COLLISION_BITS: [u32; 3] = [16, 24, 32];
const MASK_COLLISION_BITS: [u32; 3] = [32, 48, 64];

#[derive(Parser, Debug)]
#[clap(about = "Empirical quality tests for hash functions")]
struct Cli {
    /// Directory the reports and plots are written to.
    #[clap(short, long, global = true, default_value = RESULT_DIR)]
    output_dir: PathBuf,
    /// Number of worker threads. Defaults to the available parallelism.
    #[clap(short, long, global = true)]
    workers: Option<NonZeroUsize>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Hashes every key of an enumerable key space and summarizes how evenly
    /// the hits spread over the buckets.
    Distribution {
        #[clap(value_enum)]
        mode: DistributionMode,
        /// Offset of the bit window, in mask mode.
        #[clap(short, long, default_value_t = 0)]
        shift: u32,
        #[clap(short, long, default_values_t = ALL_FAMILIES)]
        algorithms: Vec<Family>,
    },

    /// Hashes a growing stream of random words and counts the samples that
    /// land in an already occupied bucket.
    Collisions {
        #[clap(short = 'l', long)]
        words_length: usize,
        #[clap(short = 'n', long, default_value_t = 1 << 24)]
        words_count: u64,
        #[clap(long, default_value_t = 0)]
        seed: u64,
        /// Probes wider hashes through a window of this many bits instead of
        /// testing them at full width.
        #[clap(short, long)]
        mask_bits: Option<u32>,
        /// Offset of the bit window, with `--mask-bits`.
        #[clap(short, long, default_value_t = 0)]
        shift: u32,
        #[clap(short, long, default_values_t = ALL_FAMILIES)]
        algorithms: Vec<Family>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DistributionMode {
    Normal,
    Bins,
    Mask,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::default();
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    let evaluator = Evaluator::new(config);
    let mut sink = FileSink::new(&cli.output_dir);
    info!(
        output_dir = %cli.output_dir.display(),
        workers = evaluator.config().workers.get(),
        "starting"
    );

    match cli.command {
        Command::Distribution {
            mode,
            shift,
            algorithms,
        } => {
            let runs = match mode {
                DistributionMode::Normal => NORMAL_DISTRIBUTION_BITS
                    .iter()
                    .map(|&bits| (bits, bits, Mode::Normal))
                    .collect::<Vec<_>>(),
                DistributionMode::Bins => BINS_DISTRIBUTION_BITS
                    .iter()
                    .map(|&bits| (bits, bits, Mode::Bins))
                    .collect(),
                DistributionMode::Mask => MASK_DISTRIBUTION_BITS
                    .iter()
                    .map(|&bits| (bits, MASK_DISTRIBUTION_WINDOW, Mode::Mask { shift }))
                    .collect(),
            };
            for (hash_bits, test_bits, mode) in runs {
                let params = evaluator.check_parameters(hash_bits, test_bits, mode)?;
                with_catalog(hash_bits, &algorithms, |hashes| {
                    evaluator.distribution_test(hashes, &params, &mut sink)
                })?;
            }
        }
        Command::Collisions {
            words_length,
            words_count,
            seed,
            mask_bits,
            shift,
            algorithms,
        } => {
            let runs = match mask_bits {
                None => NORMAL_COLLISION_BITS
                    .iter()
                    .map(|&bits| (bits, bits, Mode::Normal))
                    .collect::<Vec<_>>(),
                Some(test_bits) => MASK_COLLISION_BITS
                    .iter()
                    .filter(|&&bits| bits > test_bits)
                    .map(|&bits| (bits, test_bits, Mode::Mask { shift }))
                    .collect(),
            };
            let source = RandomBlocks::new(seed);
            for (hash_bits, test_bits, mode) in runs {
                let params =
                    WordsParameters::new(hash_bits, test_bits, words_count, words_length, mode)?;
                with_catalog(hash_bits, &algorithms, |hashes| {
                    evaluator.collision_test(hashes, &params, &source, seed, &mut sink)
                })?;
            }
        }
    }
    Ok(())
}

/// Calls `run` with the `hash_bits`-wide members of `families`, if any.
fn with_catalog(
    hash_bits: u32,
    families: &[Family],
    run: impl FnOnce(&[&dyn HashFunction]) -> Result<(), hashdist::Error>,
) -> Result<(), hashdist::Error> {
    let hashes = catalog(hash_bits, families);
    if hashes.is_empty() {
        info!(hash_bits, "no selected hash function has this width, skipping");
        return Ok(());
    }
    let hashes = hashes.iter().map(|hash| &**hash).collect::<Vec<&dyn HashFunction>>();
    run(&hashes)
}
