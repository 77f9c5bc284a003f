// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::error::CapabilityError;

/// A reseedable stream of fixed-length byte blocks.
pub trait BlockSource {
    fn reseed(&mut self, seed: u64);

    /// Overwrites `block` with the next block of the stream.
    fn fill_block(&mut self, block: &mut [u8]) -> Result<(), CapabilityError>;
}

/// Uniformly random blocks.
#[derive(Clone, Debug)]
pub struct RandomBlocks {
    rng: StdRng,
}

impl RandomBlocks {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl BlockSource for RandomBlocks {
    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    #[inline]
    fn fill_block(&mut self, block: &mut [u8]) -> Result<(), CapabilityError> {
        self.rng
            .try_fill_bytes(block)
            .map_err(|err| CapabilityError::new(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(source: &mut impl BlockSource, count: usize, len: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|_| {
                let mut block = vec![0; len];
                source.fill_block(&mut block).unwrap();
                block
            })
            .collect()
    }

    #[test]
    fn reseeding_replays_the_stream() {
        let mut source = RandomBlocks::new(7);
        let first = take(&mut source, 10, 16);
        source.reseed(7);
        assert_eq!(take(&mut source, 10, 16), first);
        assert_eq!(take(&mut RandomBlocks::new(7), 10, 16), first);
    }

    #[test]
    fn seeds_differ() {
        assert_ne!(
            take(&mut RandomBlocks::new(1), 4, 32),
            take(&mut RandomBlocks::new(2), 4, 32)
        );
    }
}
