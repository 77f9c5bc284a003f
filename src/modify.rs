// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use crate::params::{Mode, Parameters};

/// Maps a raw hash value to a bucket index.
///
/// Built once per run from validated parameters, so that the per-key path
/// is a single branch-free operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketMap {
    Identity,
    Window { shift: u32, mask: u64 },
    Divide { divisor: u64 },
}

impl BucketMap {
    pub fn new(mode: Mode, test_bits: u32, divisor: u64) -> Self {
        match mode {
            Mode::Normal => BucketMap::Identity,
            Mode::Mask { shift } => BucketMap::Window {
                shift,
                mask: low_bits_mask(test_bits),
            },
            Mode::Bins => BucketMap::Divide { divisor },
        }
    }

    #[inline]
    pub fn bucket(&self, hash: u64) -> u64 {
        match *self {
            BucketMap::Identity => hash,
            BucketMap::Window { shift, mask } => (hash >> shift) & mask,
            BucketMap::Divide { divisor } => hash / divisor,
        }
    }
}

/// Maps `hash` to a bucket index according to `params`.
#[inline]
pub fn modify(hash: u64, params: &impl Parameters) -> u64 {
    params.bucket_map().bucket(hash)
}

#[inline]
const fn low_bits_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        !0
    } else {
        (1 << bits) - 1
    }
}
