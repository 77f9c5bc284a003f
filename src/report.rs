// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{collisions::Checkpoint, error::Error, params::Mode, stats::DistributionSummary};

pub const DISTRIBUTION_TEST_NAME: &str = "Distribution test";
pub const COLLISION_TEST_NAME: &str = "Collision test";

/// Result of a whole-keyspace distribution test for one hash function.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistributionReport {
    pub test_name: String,
    pub hash_name: String,
    pub mode: Mode,
    pub hash_bits: u32,
    pub test_bits: u32,
    pub key_count: u64,
    pub buckets_count: u64,
    pub p_value: f64,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub summary: DistributionSummary,
}

/// Collision curve of one hash function.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionReport {
    pub test_name: String,
    pub hash_name: String,
    pub mode: Mode,
    pub hash_bits: u32,
    pub test_bits: u32,
    pub words_length: usize,
    pub checkpoints: Vec<Checkpoint>,
}

/// Receives finished results. Persistence and formatting are up to the
/// implementation.
pub trait ReportSink {
    fn distribution(&mut self, report: &DistributionReport) -> Result<(), Error>;

    fn collisions(&mut self, report: &CollisionReport) -> Result<(), Error>;
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn distribution(&mut self, report: &DistributionReport) -> Result<(), Error> {
        (**self).distribution(report)
    }

    fn collisions(&mut self, report: &CollisionReport) -> Result<(), Error> {
        (**self).collisions(report)
    }
}

/// Keeps reports in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub distributions: Vec<DistributionReport>,
    pub collisions: Vec<CollisionReport>,
}

impl ReportSink for MemorySink {
    fn distribution(&mut self, report: &DistributionReport) -> Result<(), Error> {
        self.distributions.push(report.clone());
        Ok(())
    }

    fn collisions(&mut self, report: &CollisionReport) -> Result<(), Error> {
        self.collisions.push(report.clone());
        Ok(())
    }
}
