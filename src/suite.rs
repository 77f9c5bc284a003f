// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Runs the engines over sets of hash functions and forwards the results to a
//! [`ReportSink`].

use std::{num::NonZeroUsize, sync::mpsc, thread};

use tracing::{debug, info, info_span};

use crate::{
    blocks::BlockSource,
    collisions::{CheckpointSchedule, CollisionCounter},
    distribution::{available_parallelism, BucketCounter},
    error::Error,
    hasher::HashFunction,
    params::{
        BinsTable, CheckParameters, Mode, Parameters, TestParameters, WordsParameters,
    },
    report::{
        CollisionReport, DistributionReport, ReportSink, COLLISION_TEST_NAME,
        DISTRIBUTION_TEST_NAME,
    },
    stats::{uniformity_p_value, DistributionSummary},
};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Workers of a distribution run, and number of collision runs evaluated
    /// at once.
    pub workers: NonZeroUsize,
    pub bins: BinsTable,
    pub schedule: CheckpointSchedule,
    /// Bytes of seen flags that concurrent collision runs may hold together.
    /// A 32-bit window takes 512 MiB per run; at least one run always
    /// proceeds.
    pub collision_memory: u64,
}

/// Room for two 32-bit collision runs.
const DEFAULT_COLLISION_MEMORY: u64 = 1 << 30;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: available_parallelism(),
            bins: BinsTable::default(),
            schedule: CheckpointSchedule::default(),
            collision_memory: DEFAULT_COLLISION_MEMORY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Evaluator {
    config: EngineConfig,
    bucket_counter: BucketCounter,
    collision_counter: CollisionCounter,
}

impl Evaluator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            bucket_counter: BucketCounter::new(config.workers),
            collision_counter: CollisionCounter::new(config.schedule.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds distribution test parameters with the configured bins table.
    pub fn check_parameters(
        &self,
        hash_bits: u32,
        test_bits: u32,
        mode: Mode,
    ) -> Result<CheckParameters, Error> {
        CheckParameters::new(hash_bits, test_bits, mode, &self.config.bins)
    }

    /// Counts the buckets of `hash` over the whole key space and summarizes
    /// them.
    pub fn distribution<H>(
        &self,
        hash: &H,
        params: &CheckParameters,
    ) -> Result<DistributionReport, Error>
    where
        H: HashFunction + ?Sized,
    {
        check_width(hash, params.test())?;
        let _span = info_span!(
            "distribution",
            hash = %hash,
            mode = %params.mode(),
            hash_bits = params.hash_bits(),
            test_bits = params.test_bits()
        )
        .entered();

        let buckets = self.bucket_counter.count(hash, params)?;
        let summary = DistributionSummary::new(buckets.counts(), params.divisor())?;
        Ok(DistributionReport {
            test_name: DISTRIBUTION_TEST_NAME.to_owned(),
            hash_name: hash.to_string(),
            mode: params.mode(),
            hash_bits: params.hash_bits(),
            test_bits: params.test_bits(),
            key_count: params.key_count(),
            buckets_count: params.buckets_count(),
            p_value: uniformity_p_value(buckets.counts()),
            summary,
        })
    }

    /// Runs [`Evaluator::distribution`] for each hash function in turn.
    ///
    /// Stops at the first failure; reports already forwarded are kept.
    pub fn distribution_test<S>(
        &self,
        hashes: &[&dyn HashFunction],
        params: &CheckParameters,
        sink: &mut S,
    ) -> Result<(), Error>
    where
        S: ReportSink + ?Sized,
    {
        info!(
            mode = %params.mode(),
            hash_bits = params.hash_bits(),
            hashes = hashes.len(),
            "distribution test started"
        );
        for hash in hashes {
            check_width(hash, params.test())?;
        }
        for hash in hashes {
            sink.distribution(&self.distribution(hash, params)?)?;
        }
        info!(hash_bits = params.hash_bits(), "distribution test finished");
        Ok(())
    }

    /// Computes the collision curve of `hash` over words drawn from `source`.
    pub fn collisions<H, S>(
        &self,
        hash: &H,
        params: &WordsParameters,
        source: &mut S,
    ) -> Result<CollisionReport, Error>
    where
        H: HashFunction + ?Sized,
        S: BlockSource + ?Sized,
    {
        check_width(hash, params.test())?;
        let _span = info_span!(
            "collisions",
            hash = %hash,
            mode = %params.mode(),
            hash_bits = params.hash_bits(),
            test_bits = params.test_bits(),
            words_length = params.words_length()
        )
        .entered();

        let checkpoints = self.collision_counter.run(hash, params, source)?;
        let hash_name = match params.mode() {
            Mode::Mask { .. } => format!("{hash} (mask {} bits)", params.test_bits()),
            _ => hash.to_string(),
        };
        Ok(CollisionReport {
            test_name: COLLISION_TEST_NAME.to_owned(),
            hash_name,
            mode: params.mode(),
            hash_bits: params.hash_bits(),
            test_bits: params.test_bits(),
            words_length: params.words_length(),
            checkpoints,
        })
    }

    /// Number of collision runs over `params` evaluated at once: at most
    /// `workers`, and no more than the seen flags of
    /// [`EngineConfig::collision_memory`] allow.
    pub fn collision_batch_size(&self, params: &WordsParameters) -> usize {
        let per_run = params.buckets_count().div_ceil(8);
        let fitting =
            usize::try_from(self.config.collision_memory / per_run).unwrap_or(usize::MAX);
        fitting.clamp(1, self.config.workers.get())
    }

    /// Runs [`Evaluator::collisions`] for several hash functions, up to
    /// [`Evaluator::collision_batch_size`] of them at once.
    ///
    /// Each run gets its own copy of `source` reseeded with `seed`, so every
    /// hash function sees the same words. Runs share no state. Reports are
    /// forwarded in the order of `hashes`, stopping at the first failure.
    pub fn collision_test<S, R>(
        &self,
        hashes: &[&dyn HashFunction],
        params: &WordsParameters,
        source: &S,
        seed: u64,
        sink: &mut R,
    ) -> Result<(), Error>
    where
        S: BlockSource + Clone + Send,
        R: ReportSink + ?Sized,
    {
        info!(
            mode = %params.mode(),
            hash_bits = params.hash_bits(),
            test_bits = params.test_bits(),
            words_length = params.words_length(),
            hashes = hashes.len(),
            "collision test started"
        );
        for hash in hashes {
            check_width(hash, params.test())?;
        }

        let batch_size = self.collision_batch_size(params);
        debug!(batch_size, "collision runs per batch");
        for batch in hashes.chunks(batch_size) {
            let (tx, rx) = mpsc::channel();
            thread::scope(|scope| {
                for (index, &hash) in batch.iter().enumerate() {
                    let tx = tx.clone();
                    let mut source = source.clone();
                    scope.spawn(move || {
                        source.reseed(seed);
                        // The receiver outlives the scope.
                        let _ = tx.send((index, self.collisions(hash, params, &mut source)));
                    });
                }
            });
            drop(tx);

            let mut results = rx.into_iter().collect::<Vec<_>>();
            results.sort_by_key(|&(index, _)| index);
            for (_, result) in results {
                sink.collisions(&result?)?;
            }
        }
        info!(hash_bits = params.hash_bits(), "collision test finished");
        Ok(())
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn check_width<H>(hash: &H, params: &TestParameters) -> Result<(), Error>
where
    H: HashFunction + ?Sized,
{
    if hash.bits() != params.hash_bits() {
        return Err(Error::WidthMismatch {
            mode: params.mode(),
            hash_bits: hash.bits(),
            test_bits: params.hash_bits(),
        });
    }
    Ok(())
}
