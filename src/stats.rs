// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::warn;

use crate::error::Error;

/// Number of bars a bucket array is reduced to.
pub const BAR_COUNT: usize = 16;

/// Summary of a group of contiguous buckets.
///
/// The spread is the distance from the mean to the extremes, not a
/// variance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bar {
    /// Median bucket index of the group, scaled by the bin size.
    pub x: u64,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
    pub err_min: f64,
    pub err_max: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistributionSummary {
    pub bin_size: u64,
    pub bars: Vec<Bar>,
}

impl DistributionSummary {
    /// Reduces `counts` to [`BAR_COUNT`] groups of equal width.
    ///
    /// Trailing buckets that do not fill a whole group are left out.
    pub fn new(counts: &[u64], bin_size: u64) -> Result<Self, Error> {
        if counts.len() < BAR_COUNT {
            return Err(Error::TooFewBuckets {
                buckets: counts.len(),
                bars: BAR_COUNT,
            });
        }
        let step = counts.len() / BAR_COUNT;
        let dropped = counts.len() % BAR_COUNT;
        if dropped != 0 {
            warn!(dropped, buckets = counts.len(), "buckets left out of the bars");
        }

        let bars = counts
            .chunks_exact(step)
            .take(BAR_COUNT)
            .enumerate()
            .map(|(index, group)| {
                let (begin, end) = ((index * step) as u64, ((index + 1) * step) as u64);
                let mean = group.iter().map(|&c| c as f64).sum::<f64>() / step as f64;
                // Groups are non-empty since step >= 1.
                let min = group.iter().copied().min().unwrap_or_default();
                let max = group.iter().copied().max().unwrap_or_default();
                Bar {
                    x: (begin + end) / 2 * bin_size,
                    mean,
                    min,
                    max,
                    err_min: (mean - min as f64).abs(),
                    err_max: (mean - max as f64).abs(),
                }
            })
            .collect();
        Ok(Self { bin_size, bars })
    }
}

/// P-value of the chi-squared test of `counts` against the uniform
/// distribution.
pub fn uniformity_p_value(counts: &[u64]) -> f64 {
    let total = counts.iter().sum::<u64>();
    if counts.len() < 2 || total == 0 {
        return 1.0;
    }
    let expected_count = total as f64 / counts.len() as f64;

    let statistic = counts
        .iter()
        .map(|&o| (o as f64 - expected_count).powi(2) / expected_count)
        .sum::<f64>();

    let degrees_of_freedom = counts.len() as f64 - 1.0;

    match ChiSquared::new(degrees_of_freedom) {
        Ok(distribution) => 1.0 - distribution.cdf(statistic),
        Err(_) => f64::NAN,
    }
}

/// Expected number of samples that land in an already occupied bucket, when
/// `samples` values are drawn uniformly from `buckets` buckets.
pub fn expected_collisions(samples: u64, buckets: u64) -> f64 {
    if buckets == 0 {
        return 0.0;
    }
    let (n, m) = (samples as f64, buckets as f64);
    // m * (1 - 1/m)^n is the expected number of empty buckets.
    n - m + m * (n * (-1.0 / m).ln_1p()).exp()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn uniform_counts() {
        let summary = DistributionSummary::new(&[1; 1 << 16], 1).unwrap();
        assert_eq!(summary.bars.len(), BAR_COUNT);
        for (index, bar) in summary.bars.iter().enumerate() {
            assert_eq!(bar.mean, 1.0);
            assert_eq!((bar.min, bar.max), (1, 1));
            assert_eq!((bar.err_min, bar.err_max), (0.0, 0.0));
            assert_eq!(bar.x, (2 * index as u64 + 1) * 4096 / 2);
        }
    }

    #[test]
    fn group_statistics() {
        // 32 buckets, 2 per bar: [0, 2], [4, 6], ...
        let counts = (0..32).map(|i| 2 * i).collect::<Vec<u64>>();
        let summary = DistributionSummary::new(&counts, 1 << 20).unwrap();
        let bar = &summary.bars[3];
        assert_eq!((bar.min, bar.max), (12, 14));
        assert_eq!(bar.mean, 13.0);
        assert_eq!((bar.err_min, bar.err_max), (1.0, 1.0));
        assert_eq!(bar.x, 7 * (1 << 20));
        assert_eq!(summary.bin_size, 1 << 20);
    }

    #[test]
    fn trailing_buckets_are_dropped() {
        let mut counts = vec![3; 48];
        counts.extend([100; 5]);
        let summary = DistributionSummary::new(&counts, 1).unwrap();
        assert_eq!(summary.bars.len(), BAR_COUNT);
        assert!(summary.bars.iter().all(|bar| bar.max == 3));
    }

    #[test]
    fn too_few_buckets() {
        assert!(matches!(
            DistributionSummary::new(&[1; 15], 1),
            Err(Error::TooFewBuckets { buckets: 15, bars: 16 })
        ));
    }

    proptest! {
        #[test]
        fn mean_between_extremes(seed: u64, len in 16_usize..2048) {
            let mut rng = StdRng::seed_from_u64(seed);
            let counts = (0..len).map(|_| rng.gen_range(0..1000)).collect::<Vec<u64>>();
            let summary = DistributionSummary::new(&counts, 1).unwrap();
            prop_assert_eq!(summary.bars.len(), BAR_COUNT);
            for bar in summary.bars {
                prop_assert!(bar.min as f64 <= bar.mean && bar.mean <= bar.max as f64);
                prop_assert!(bar.err_min >= 0.0 && bar.err_max >= 0.0);
            }
        }
    }

    #[test]
    fn p_values() {
        assert_eq!(uniformity_p_value(&[10; 64]), 1.0);
        let mut skewed = vec![10; 64];
        skewed[0] = 500;
        assert!(uniformity_p_value(&skewed) < 1e-6);
        assert_eq!(uniformity_p_value(&[0; 8]), 1.0);
    }

    #[test]
    fn expected_collisions_limits() {
        assert_eq!(expected_collisions(0, 1 << 16), 0.0);
        assert!(expected_collisions(1, 1 << 16).abs() < 1e-9);
        // Birthday bound: about n^2 / 2m collisions while n << m.
        let e = expected_collisions(1 << 8, 1 << 16);
        assert!((e - 0.5).abs() < 0.01, "{e}");
        // Once every bucket is full, each new sample collides.
        let e = expected_collisions(1 << 20, 1 << 4);
        assert!((e - ((1 << 20) - (1 << 4)) as f64).abs() < 1e-6, "{e}");
    }
}
