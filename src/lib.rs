// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Empirical quality tests for hash functions.
//!
//! Two complementary measurements of how evenly a hash function spreads its
//! output over a bucket space:
//!
//! - __distribution__: every key of an enumerable key space is hashed, in
//!   parallel, and the bucket hit counts are reduced to 16 summary bars,
//! - __collisions__: a growing stream of generated words is hashed, and the
//!   cumulative number of samples that land in an already occupied bucket is
//!   recorded at geometrically spaced checkpoints.
//!
//! Hash values are mapped to buckets in one of three [`Mode`]s: unchanged, a
//! bit window of a wider hash, or coarsened by a fixed divisor.
//!
//! # Usage
//!
//! ```
//! use std::fmt;
//!
//! use hashdist::{CapabilityError, Evaluator, HashFunction, MemorySink, Mode};
//!
//! struct Fold16;
//! impl fmt::Display for Fold16 {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "fold-16")
//!     }
//! }
//! impl HashFunction for Fold16 {
//!     fn bits(&self) -> u32 {
//!         16
//!     }
//!
//!     fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
//!         Ok(key
//!             .chunks(2)
//!             .map(|c| u64::from(c[0]) | u64::from(*c.get(1).unwrap_or(&0)) << 8)
//!             .fold(0, |acc, word| acc ^ word))
//!     }
//! }
//!
//! let evaluator = Evaluator::default();
//! let params = evaluator.check_parameters(16, 16, Mode::Normal).unwrap();
//! let mut sink = MemorySink::default();
//! evaluator.distribution_test(&[&Fold16], &params, &mut sink).unwrap();
//!
//! let report = &sink.distributions[0];
//! assert_eq!(report.summary.bars.len(), 16);
//! // Every 16-bit key gets its own bucket.
//! assert!(report.summary.bars.iter().all(|bar| bar.min == 1 && bar.max == 1));
//! ```

pub mod blocks;
pub mod collisions;
pub mod distribution;
pub mod error;
pub mod hasher;
pub mod modify;
pub mod params;
pub mod report;
pub mod stats;
pub mod suite;

pub use blocks::{BlockSource, RandomBlocks};
pub use collisions::{CheckpointSchedule, Checkpoint, CollisionCounter, CollisionState};
pub use distribution::{BucketArray, BucketCounter};
pub use error::{CapabilityError, Error, ErrorKind};
pub use hasher::HashFunction;
pub use modify::{modify, BucketMap};
pub use params::{BinsTable, CheckParameters, Mode, Parameters, TestParameters, WordsParameters};
pub use report::{CollisionReport, DistributionReport, MemorySink, ReportSink};
pub use stats::{Bar, DistributionSummary, BAR_COUNT};
pub use suite::{EngineConfig, Evaluator};
