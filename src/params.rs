// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Test parameters and the quantities derived from them.
//!
//! Parameters are validated when they are built, so that an unsupported
//! combination of mode and widths never reaches an engine.

use std::{collections::BTreeMap, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::Error, modify::BucketMap};

/// Test widths for which the whole key space is enumerated.
pub const ENUMERABLE_TEST_BITS: [u32; 2] = [16, 24];

/// Largest window a collision test can track.
pub const MAX_COLLISION_TEST_BITS: u32 = 32;

/// How raw hashes are mapped to buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// The raw hash is the bucket.
    Normal,
    /// A `test_bits`-wide window of the raw hash, starting at bit `shift`.
    Mask { shift: u32 },
    /// The raw hash divided by a fixed divisor.
    Bins,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Mode::Normal => "Normal",
                Mode::Mask { .. } => "Mask",
                Mode::Bins => "Bins",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestParameters {
    hash_bits: u32,
    test_bits: u32,
    key_count: u64,
    mode: Mode,
}

impl TestParameters {
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    pub fn test_bits(&self) -> u32 {
        self.test_bits
    }

    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn check_mask(&self) -> Result<(), Error> {
        match self.mode {
            Mode::Mask { shift }
                if shift.saturating_add(self.test_bits) > self.hash_bits.min(u64::BITS) =>
            {
                Err(Error::MaskOutOfRange {
                    shift,
                    test_bits: self.test_bits,
                    hash_bits: self.hash_bits,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_normal_width(&self) -> Result<(), Error> {
        if self.mode == Mode::Normal && self.hash_bits != self.test_bits {
            return Err(Error::WidthMismatch {
                mode: self.mode,
                hash_bits: self.hash_bits,
                test_bits: self.test_bits,
            });
        }
        Ok(())
    }
}

/// What an engine needs to know about a parameter set.
pub trait Parameters {
    fn test(&self) -> &TestParameters;

    fn buckets_count(&self) -> u64;

    fn bucket_map(&self) -> BucketMap;
}

/// Bucket count and divisors used in [`Mode::Bins`].
///
/// Every divisor satisfies `divisor * buckets_count == 2^test_bits`, so any
/// `test_bits`-wide hash lands in `0..buckets_count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinsTable {
    buckets_count: u64,
    divisor_exponents: BTreeMap<u32, u32>,
}

impl BinsTable {
    pub fn new(
        buckets_count: u64,
        divisor_exponents: impl IntoIterator<Item = (u32, u32)>,
    ) -> Result<Self, Error> {
        if !buckets_count.is_power_of_two() {
            return Err(Error::InvalidBinsTable(format!(
                "{buckets_count} buckets is not a power of two"
            )));
        }
        let divisor_exponents = divisor_exponents.into_iter().collect::<BTreeMap<_, _>>();
        for (&test_bits, &exponent) in &divisor_exponents {
            if test_bits > u64::BITS {
                return Err(Error::InvalidBinsTable(format!(
                    "{test_bits} bits is wider than any hash"
                )));
            }
            if exponent >= u64::BITS || buckets_count.ilog2() + exponent != test_bits {
                return Err(Error::InvalidBinsTable(format!(
                    "{buckets_count} buckets of 2^{exponent} do not cover {test_bits} bits"
                )));
            }
        }
        Ok(Self {
            buckets_count,
            divisor_exponents,
        })
    }

    pub fn buckets_count(&self) -> u64 {
        self.buckets_count
    }

    pub fn divisor(&self, test_bits: u32) -> Option<u64> {
        self.divisor_exponents
            .get(&test_bits)
            .map(|&exponent| 1_u64 << exponent)
    }
}

impl Default for BinsTable {
    fn default() -> Self {
        Self {
            buckets_count: 1 << 12,
            divisor_exponents: BTreeMap::from([(32, 20), (64, 52)]),
        }
    }
}

/// Parameters of a whole-keyspace distribution test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckParameters {
    test: TestParameters,
    buckets_count: u64,
    divisor: u64,
}

impl CheckParameters {
    pub fn new(hash_bits: u32, test_bits: u32, mode: Mode, bins: &BinsTable) -> Result<Self, Error> {
        let (key_count, buckets_count, divisor) = match mode {
            Mode::Normal | Mode::Mask { .. } => {
                let key_count = enumerable_key_count(mode, test_bits)?;
                (key_count, key_count, 1)
            }
            Mode::Bins => {
                let divisor = bins
                    .divisor(test_bits)
                    .ok_or(Error::UnsupportedWidth { mode, test_bits })?;
                (1_u64 << u32::BITS, bins.buckets_count(), divisor)
            }
        };
        let test = TestParameters {
            hash_bits,
            test_bits,
            key_count,
            mode,
        };
        test.check_normal_width()?;
        test.check_mask()?;
        Ok(Self {
            test,
            buckets_count,
            divisor,
        })
    }

    pub fn hash_bits(&self) -> u32 {
        self.test.hash_bits
    }

    pub fn test_bits(&self) -> u32 {
        self.test.test_bits
    }

    pub fn key_count(&self) -> u64 {
        self.test.key_count
    }

    pub fn mode(&self) -> Mode {
        self.test.mode
    }

    pub fn buckets_count(&self) -> u64 {
        self.buckets_count
    }

    /// Width of a bucket in hash values; 1 outside of [`Mode::Bins`].
    pub fn divisor(&self) -> u64 {
        self.divisor
    }
}

impl Parameters for CheckParameters {
    fn test(&self) -> &TestParameters {
        &self.test
    }

    fn buckets_count(&self) -> u64 {
        self.buckets_count
    }

    fn bucket_map(&self) -> BucketMap {
        BucketMap::new(self.test.mode, self.test.test_bits, self.divisor)
    }
}

/// Parameters of a growing-sample collision test over generated words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordsParameters {
    test: TestParameters,
    words_length: usize,
}

impl WordsParameters {
    pub fn new(
        hash_bits: u32,
        test_bits: u32,
        words_count: u64,
        words_length: usize,
        mode: Mode,
    ) -> Result<Self, Error> {
        if mode == Mode::Bins {
            return Err(Error::UnsupportedMode { mode });
        }
        if !(1..=MAX_COLLISION_TEST_BITS).contains(&test_bits) {
            return Err(Error::UnsupportedWidth { mode, test_bits });
        }
        let test = TestParameters {
            hash_bits,
            test_bits,
            key_count: words_count,
            mode,
        };
        test.check_normal_width()?;
        test.check_mask()?;
        Ok(Self { test, words_length })
    }

    pub fn hash_bits(&self) -> u32 {
        self.test.hash_bits
    }

    pub fn test_bits(&self) -> u32 {
        self.test.test_bits
    }

    /// Number of words hashed by the last possible checkpoint.
    pub fn words_count(&self) -> u64 {
        self.test.key_count
    }

    pub fn words_length(&self) -> usize {
        self.words_length
    }

    pub fn mode(&self) -> Mode {
        self.test.mode
    }

    pub fn buckets_count(&self) -> u64 {
        1 << self.test.test_bits
    }
}

impl Parameters for WordsParameters {
    fn test(&self) -> &TestParameters {
        &self.test
    }

    fn buckets_count(&self) -> u64 {
        WordsParameters::buckets_count(self)
    }

    fn bucket_map(&self) -> BucketMap {
        BucketMap::new(self.test.mode, self.test.test_bits, 1)
    }
}

fn enumerable_key_count(mode: Mode, test_bits: u32) -> Result<u64, Error> {
    if ENUMERABLE_TEST_BITS.contains(&test_bits) {
        Ok(1 << test_bits)
    } else {
        Err(Error::UnsupportedWidth { mode, test_bits })
    }
}
