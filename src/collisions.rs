// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Growing-sample collision counting.
//!
//! Words are drawn from a [`BlockSource`], hashed and mapped to buckets. A
//! sample collides when its bucket was already hit by an earlier sample. The
//! cumulative number of collisions is recorded at checkpoints whose sample
//! counts grow geometrically.
//!
//! A run is sequential: whether a sample collides depends on every sample
//! before it.

use std::{collections::BTreeMap, time::Instant};

use bitvec::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    blocks::BlockSource,
    error::Error,
    hasher::HashFunction,
    modify::BucketMap,
    params::{Parameters, WordsParameters},
    stats::expected_collisions,
};

/// Sample counts at which collisions are recorded.
///
/// Checkpoints start at `2^(test_bits / 2)` and are multiplied by
/// `2^exponent` at each step, where the exponent defaults to 1 and can be
/// overridden per test width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointSchedule {
    default_exponent: u32,
    exponents: BTreeMap<u32, u32>,
}

impl CheckpointSchedule {
    pub fn new(default_exponent: u32, exponents: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            default_exponent: default_exponent.max(1),
            exponents: exponents
                .into_iter()
                .map(|(test_bits, exponent)| (test_bits, exponent.max(1)))
                .collect(),
        }
    }

    pub fn exponent(&self, test_bits: u32) -> u32 {
        self.exponents
            .get(&test_bits)
            .copied()
            .unwrap_or(self.default_exponent)
    }

    /// Checkpoints of a run over at most `samples` samples.
    pub fn checkpoints(&self, test_bits: u32, samples: u64) -> impl Iterator<Item = u64> {
        let exponent = self.exponent(test_bits);
        std::iter::successors(1_u64.checked_shl(test_bits / 2), move |&n| {
            n.checked_mul(1_u64.checked_shl(exponent)?)
        })
        .take_while(move |&n| n <= samples)
    }
}

impl Default for CheckpointSchedule {
    /// Doubles at every step, except for 24-bit tests which quadruple to keep
    /// the number of samples manageable.
    fn default() -> Self {
        Self::new(1, [(24, 2)])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Checkpoint {
    pub samples: u64,
    pub collisions: u64,
    /// Collisions expected from a perfectly uniform hash.
    pub expected_collisions: f64,
}

/// Bucket occupancy flags and the running collision count of one run.
#[derive(Clone, Debug)]
pub struct CollisionState {
    seen: BitVec,
    buckets: u64,
    collisions: u64,
}

impl CollisionState {
    pub fn new(buckets: u64) -> Self {
        Self {
            seen: bitvec![0; buckets as usize],
            buckets,
            collisions: 0,
        }
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn buckets(&self) -> u64 {
        self.buckets
    }

    /// Marks `bucket` as hit, and counts a collision if it already was.
    ///
    /// Returns whether the sample collided, or `None` if `bucket` is out of
    /// range.
    #[inline]
    pub fn observe(&mut self, bucket: u64) -> Option<bool> {
        if bucket >= self.buckets {
            return None;
        }
        let collided = self.seen.replace(bucket as usize, true);
        self.collisions += u64::from(collided);
        Some(collided)
    }
}

/// Runs growing-sample collision tests for one hash function at a time.
#[derive(Clone, Debug, Default)]
pub struct CollisionCounter {
    schedule: CheckpointSchedule,
}

impl CollisionCounter {
    pub fn new(schedule: CheckpointSchedule) -> Self {
        Self { schedule }
    }

    /// Hashes words from `source` until the last checkpoint not exceeding
    /// `params.words_count()` and returns the collision curve.
    ///
    /// The source is consumed in order, exactly one block per sample.
    pub fn run<H, S>(
        &self,
        hash: &H,
        params: &WordsParameters,
        source: &mut S,
    ) -> Result<Vec<Checkpoint>, Error>
    where
        H: HashFunction + ?Sized,
        S: BlockSource + ?Sized,
    {
        let started = Instant::now();
        let bucket_map = params.bucket_map();
        let mut state = CollisionState::new(params.buckets_count());
        let mut word = vec![0; params.words_length()];
        let mut samples = 0_u64;
        let mut curve = Vec::new();

        for checkpoint in self
            .schedule
            .checkpoints(params.test_bits(), params.words_count())
        {
            while samples < checkpoint {
                source
                    .fill_block(&mut word)
                    .map_err(|source| Error::BlockSource { source })?;
                observe(hash, bucket_map, &mut state, &word)?;
                samples += 1;
            }
            debug!(samples, collisions = state.collisions(), "checkpoint");
            curve.push(Checkpoint {
                samples,
                collisions: state.collisions(),
                expected_collisions: expected_collisions(samples, state.buckets()),
            });
        }

        info!(
            hash = %hash,
            samples,
            collisions = state.collisions(),
            elapsed = ?started.elapsed(),
            "counted collisions"
        );
        Ok(curve)
    }
}

#[inline]
fn observe<H>(
    hash: &H,
    bucket_map: BucketMap,
    state: &mut CollisionState,
    word: &[u8],
) -> Result<bool, Error>
where
    H: HashFunction + ?Sized,
{
    let raw = hash.hash(word).map_err(|source| Error::Hash {
        name: hash.to_string(),
        source,
    })?;
    let bucket = bucket_map.bucket(raw);
    state.observe(bucket).ok_or_else(|| Error::BucketOutOfRange {
        name: hash.to_string(),
        bucket,
        buckets: state.buckets(),
    })
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use test_case::test_case;

    use super::*;
    use crate::{
        blocks::RandomBlocks,
        error::{CapabilityError, ErrorKind},
        params::Mode,
    };

    struct Constant;
    impl fmt::Display for Constant {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constant")
        }
    }
    impl HashFunction for Constant {
        fn bits(&self) -> u32 {
            16
        }

        fn hash(&self, _key: &[u8]) -> Result<u64, CapabilityError> {
            Ok(0)
        }
    }

    /// Reads the first 8 bytes of the word, truncated to `bits` bits.
    struct Prefix(u32);
    impl fmt::Display for Prefix {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "prefix ({} bits)", self.0)
        }
    }
    impl HashFunction for Prefix {
        fn bits(&self) -> u32 {
            self.0
        }

        fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
            let prefix = u64::from_le_bytes(key[..8].try_into().unwrap());
            Ok(prefix & ((1 << self.0) - 1))
        }
    }

    /// Emits 0, 1, 2, ... as little-endian words, except that the word at
    /// index `repeat.0` repeats the one at index `repeat.1`.
    struct Counter {
        next: u64,
        repeat: Option<(u64, u64)>,
    }
    impl Counter {
        fn new(repeat: Option<(u64, u64)>) -> Self {
            Self { next: 0, repeat }
        }
    }
    impl BlockSource for Counter {
        fn reseed(&mut self, seed: u64) {
            self.next = seed;
        }

        fn fill_block(&mut self, block: &mut [u8]) -> Result<(), CapabilityError> {
            let value = match self.repeat {
                Some((at, original)) if at == self.next => original,
                _ => self.next,
            };
            block.fill(0);
            block[..8].copy_from_slice(&value.to_le_bytes());
            self.next += 1;
            Ok(())
        }
    }

    struct Exhausted(u64);
    impl BlockSource for Exhausted {
        fn reseed(&mut self, _seed: u64) {}

        fn fill_block(&mut self, block: &mut [u8]) -> Result<(), CapabilityError> {
            if self.0 == 0 {
                return Err(CapabilityError::new("no more blocks"));
            }
            self.0 -= 1;
            block.fill(0xAB);
            Ok(())
        }
    }

    fn words_16(words_count: u64) -> WordsParameters {
        WordsParameters::new(16, 16, words_count, 16, Mode::Normal).unwrap()
    }

    #[test_case(16, 1 << 16, &[256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536])]
    #[test_case(16, 1000, &[256, 512])]
    #[test_case(24, 1 << 24, &[4096, 16384, 65536, 262144, 1048576, 4194304, 16777216])]
    #[test_case(32, 1 << 20, &[65536, 131072, 262144, 524288, 1048576])]
    #[test_case(16, 100, &[])]
    fn default_checkpoints(test_bits: u32, samples: u64, expected: &[u64]) {
        assert_eq!(
            CheckpointSchedule::default()
                .checkpoints(test_bits, samples)
                .collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn checkpoints_stop_before_overflow() {
        let schedule = CheckpointSchedule::new(3, std::iter::empty());
        let last = schedule.checkpoints(32, u64::MAX).last().unwrap();
        assert_eq!(last, 1 << 61);
    }

    #[test]
    fn constant_hash_always_collides() {
        let curve = CollisionCounter::default()
            .run(&Constant, &words_16(1 << 16), &mut RandomBlocks::new(0))
            .unwrap();
        assert_eq!(curve.len(), 9);
        for checkpoint in curve {
            assert_eq!(checkpoint.collisions, checkpoint.samples - 1);
        }
    }

    #[test]
    fn distinct_values_never_collide() {
        let curve = CollisionCounter::default()
            .run(&Prefix(16), &words_16(1 << 16), &mut Counter::new(None))
            .unwrap();
        let last = curve.last().unwrap();
        assert_eq!(last.samples, 1 << 16);
        assert_eq!(last.collisions, 0);
    }

    #[test]
    fn one_repeat_is_one_collision() {
        // The 301st word repeats the 6th one; it is hashed between the 256
        // and 512 checkpoints.
        let curve = CollisionCounter::default()
            .run(&Prefix(16), &words_16(1 << 16), &mut Counter::new(Some((300, 5))))
            .unwrap();
        assert_eq!((curve[0].samples, curve[0].collisions), (256, 0));
        assert!(curve[1..].iter().all(|c| c.collisions == 1));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let counter = CollisionCounter::default();
        let params = WordsParameters::new(32, 24, 1 << 18, 12, Mode::Mask { shift: 8 }).unwrap();
        let hash = Prefix(32);
        let mut source = RandomBlocks::new(42);
        let first = counter.run(&hash, &params, &mut source).unwrap();
        source.reseed(42);
        let second = counter.run(&hash, &params, &mut source).unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].collisions <= w[1].collisions));
    }

    #[test]
    fn random_words_follow_the_birthday_bound() {
        let curve = CollisionCounter::default()
            .run(&Prefix(16), &words_16(1 << 14), &mut RandomBlocks::new(3))
            .unwrap();
        let last = curve.last().unwrap();
        let expected = last.expected_collisions;
        let deviation = (last.collisions as f64 - expected).abs();
        assert!(deviation < 6.0 * expected.sqrt(), "{last:?}");
    }

    #[test]
    fn source_failure_aborts_the_run() {
        let error = CollisionCounter::default()
            .run(&Constant, &words_16(1 << 16), &mut Exhausted(1000))
            .unwrap_err();
        assert!(matches!(error, Error::BlockSource { .. }));
        assert_eq!(error.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn out_of_range_hash_is_a_runtime_failure() {
        let error = CollisionCounter::default()
            .run(&Prefix(20), &words_16(1 << 16), &mut RandomBlocks::new(0))
            .unwrap_err();
        assert!(matches!(error, Error::BucketOutOfRange { buckets: 65536, .. }));
    }

    #[test]
    fn state_test_and_set() {
        let mut state = CollisionState::new(100);
        assert_eq!(state.observe(99), Some(false));
        assert_eq!(state.observe(63), Some(false));
        assert_eq!(state.observe(64), Some(false));
        assert_eq!(state.observe(99), Some(true));
        assert_eq!(state.observe(99), Some(true));
        assert_eq!(state.observe(100), None);
        assert_eq!(state.collisions(), 2);
    }

    #[test]
    fn state_second_pass_collides_everywhere() {
        let buckets = (1 << 16) + 3;
        let mut state = CollisionState::new(buckets);
        assert!((0..buckets).all(|bucket| state.observe(bucket) == Some(false)));
        assert_eq!(state.collisions(), 0);
        assert!((0..buckets).rev().all(|bucket| state.observe(bucket) == Some(true)));
        assert_eq!(state.collisions(), buckets);
    }
}
