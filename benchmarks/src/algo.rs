// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Hash functions available to the test suites.
//!
//! Widths that a function does not natively produce are obtained either by
//! xor-folding a wider result or, for functions whose arithmetic wraps
//! modulo the word size, by truncation.

use std::fmt;

use hashdist::{CapabilityError, HashFunction};
use xxhash_rust::{xxh3::xxh3_64, xxh32::xxh32, xxh64::xxh64};

/// Widths the catalog is built for.
pub const SUPPORTED_BITS: [u32; 5] = [16, 24, 32, 48, 64];

pub const ALL_FAMILIES: [Family; 8] = [
    Family::Fnv1a,
    Family::Djb2,
    Family::Sdbm,
    Family::Pjw,
    Family::OneAtATime,
    Family::Xxh32,
    Family::Xxh64,
    Family::Xxh3,
];

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    #[clap(name = "fnv1a")]
    Fnv1a,
    #[clap(name = "djb2")]
    Djb2,
    #[clap(name = "sdbm")]
    Sdbm,
    #[clap(name = "pjw")]
    Pjw,
    #[clap(name = "one-at-a-time")]
    OneAtATime,
    #[clap(name = "xxh32")]
    Xxh32,
    #[clap(name = "xxh64")]
    Xxh64,
    #[clap(name = "xxh3")]
    Xxh3,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Family::Fnv1a => "fnv1a",
                Family::Djb2 => "djb2",
                Family::Sdbm => "sdbm",
                Family::Pjw => "pjw",
                Family::OneAtATime => "one-at-a-time",
                Family::Xxh32 => "xxh32",
                Family::Xxh64 => "xxh64",
                Family::Xxh3 => "xxh3",
            }
        )
    }
}

impl Family {
    pub fn supports(&self, bits: u32) -> bool {
        match self {
            Family::Fnv1a | Family::Djb2 | Family::Sdbm | Family::Pjw | Family::Xxh3 => {
                SUPPORTED_BITS.contains(&bits)
            }
            Family::OneAtATime | Family::Xxh32 => bits == 32,
            Family::Xxh64 => bits == 64,
        }
    }

    /// Returns the `bits`-wide member of the family, if there is one.
    pub fn build(&self, bits: u32) -> Option<Box<dyn HashFunction>> {
        if !self.supports(bits) {
            return None;
        }
        Some(match self {
            Family::Fnv1a => Box::new(Fnv1a { bits }),
            Family::Djb2 => Box::new(Djb2 { bits }),
            Family::Sdbm => Box::new(Sdbm { bits }),
            Family::Pjw => Box::new(Pjw { bits }),
            Family::OneAtATime => Box::new(OneAtATime),
            Family::Xxh32 => Box::new(Xxh32),
            Family::Xxh64 => Box::new(Xxh64),
            Family::Xxh3 => Box::new(Xxh3 { bits }),
        })
    }
}

/// Every `bits`-wide member of `families`.
pub fn catalog(bits: u32, families: &[Family]) -> Vec<Box<dyn HashFunction>> {
    families
        .iter()
        .filter_map(|family| family.build(bits))
        .collect()
}

#[inline]
const fn mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        !0
    } else {
        (1 << bits) - 1
    }
}

/// Folds a `from`-bit hash into `bits` bits.
#[inline]
const fn xor_fold(hash: u64, from: u32, bits: u32) -> u64 {
    if bits >= from {
        hash
    } else {
        (hash ^ (hash >> bits)) & mask(bits)
    }
}

#[derive(Clone, Debug)]
pub struct Fnv1a {
    bits: u32,
}
impl fmt::Display for Fnv1a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FNV-1a ({} bits)", self.bits)
    }
}
impl HashFunction for Fnv1a {
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        Ok(if self.bits <= 32 {
            xor_fold(u64::from(fnv1a_32(key)), 32, self.bits)
        } else {
            xor_fold(fnv1a_64(key), 64, self.bits)
        })
    }
}

fn fnv1a_32(key: &[u8]) -> u32 {
    key.iter().fold(0x811C_9DC5, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

fn fnv1a_64(key: &[u8]) -> u64 {
    key.iter().fold(0xCBF2_9CE4_8422_2325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01B3)
    })
}

/// Bernstein's hash, `h * 33 + c`.
#[derive(Clone, Debug)]
pub struct Djb2 {
    bits: u32,
}
impl fmt::Display for Djb2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DJB2 ({} bits)", self.bits)
    }
}
impl HashFunction for Djb2 {
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        let hash = key.iter().fold(5381_u64, |hash, &byte| {
            hash.wrapping_mul(33).wrapping_add(u64::from(byte))
        });
        Ok(hash & mask(self.bits))
    }
}

#[derive(Clone, Debug)]
pub struct Sdbm {
    bits: u32,
}
impl fmt::Display for Sdbm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SDBM ({} bits)", self.bits)
    }
}
impl HashFunction for Sdbm {
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        let hash = key.iter().fold(0_u64, |hash, &byte| {
            u64::from(byte)
                .wrapping_add(hash << 6)
                .wrapping_add(hash << 16)
                .wrapping_sub(hash)
        });
        Ok(hash & mask(self.bits))
    }
}

/// Peter J. Weinberger's hash, computed in a `bits`-wide word.
#[derive(Clone, Debug)]
pub struct Pjw {
    bits: u32,
}
impl fmt::Display for Pjw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PJW ({} bits)", self.bits)
    }
}
impl HashFunction for Pjw {
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        let (three_quarters, one_eighth) = (self.bits * 3 / 4, self.bits / 8);
        let word = mask(self.bits);
        let high_bits = word << (self.bits - one_eighth) & word;
        let hash = key.iter().fold(0_u64, |hash, &byte| {
            let hash = ((hash << one_eighth) & word) + u64::from(byte);
            match hash & high_bits {
                0 => hash,
                test => (hash ^ (test >> three_quarters)) & !high_bits,
            }
        });
        Ok(hash & word)
    }
}

/// Bob Jenkins' one-at-a-time hash.
#[derive(Clone, Debug)]
pub struct OneAtATime;
impl fmt::Display for OneAtATime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "One-at-a-time (32 bits)")
    }
}
impl HashFunction for OneAtATime {
    fn bits(&self) -> u32 {
        32
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        let mut hash = key.iter().fold(0_u32, |hash, &byte| {
            let hash = hash.wrapping_add(u32::from(byte));
            let hash = hash.wrapping_add(hash << 10);
            hash ^ (hash >> 6)
        });
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash = hash.wrapping_add(hash << 15);
        Ok(u64::from(hash))
    }
}

#[derive(Clone, Debug)]
pub struct Xxh32;
impl fmt::Display for Xxh32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XXH32")
    }
}
impl HashFunction for Xxh32 {
    fn bits(&self) -> u32 {
        32
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        Ok(u64::from(xxh32(key, 0)))
    }
}

#[derive(Clone, Debug)]
pub struct Xxh64;
impl fmt::Display for Xxh64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XXH64")
    }
}
impl HashFunction for Xxh64 {
    fn bits(&self) -> u32 {
        64
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        Ok(xxh64(key, 0))
    }
}

#[derive(Clone, Debug)]
pub struct Xxh3 {
    bits: u32,
}
impl fmt::Display for Xxh3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XXH3 ({} bits)", self.bits)
    }
}
impl HashFunction for Xxh3 {
    fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        Ok(xor_fold(xxh3_64(key), 64, self.bits))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn hash(hash: &dyn HashFunction, key: &[u8]) -> u64 {
        hash.hash(key).unwrap()
    }

    #[test]
    fn known_values() {
        assert_eq!(hash(&Fnv1a { bits: 32 }, b""), 0x811C_9DC5);
        assert_eq!(hash(&Fnv1a { bits: 32 }, b"a"), 0xE40C_292C);
        assert_eq!(hash(&Fnv1a { bits: 64 }, b"a"), 0xAF63_DC4C_8601_EC8C);
        assert_eq!(hash(&Djb2 { bits: 32 }, b"a"), 5381 * 33 + 97);
        assert_eq!(hash(&Sdbm { bits: 32 }, b"a"), 97);
        assert_eq!(hash(&OneAtATime, b"a"), 0xCA2E_9442);
        assert_eq!(hash(&Xxh64, b""), 0xEF46_DB37_51D8_E999);
        assert_eq!(hash(&Xxh32, b""), 0x02CC_5D05);
    }

    #[test]
    fn truncation_matches_narrow_arithmetic() {
        // DJB2 in a 16-bit word.
        let narrow = b"hash functions"
            .iter()
            .fold(5381_u16, |h, &c| h.wrapping_mul(33).wrapping_add(u16::from(c)));
        assert_eq!(hash(&Djb2 { bits: 16 }, b"hash functions"), u64::from(narrow));
    }

    #[test]
    fn catalog_widths() {
        for bits in SUPPORTED_BITS {
            let hashes = catalog(bits, &ALL_FAMILIES);
            assert!(!hashes.is_empty());
            assert!(hashes.iter().all(|h| h.bits() == bits));
        }
        assert_eq!(catalog(16, &[Family::Xxh64, Family::Xxh32]).len(), 0);
        assert_eq!(catalog(32, &ALL_FAMILIES).len(), 7);
    }

    proptest! {
        #[test]
        fn values_fit_their_width(key: Vec<u8>) {
            for bits in SUPPORTED_BITS {
                for hash in catalog(bits, &ALL_FAMILIES) {
                    prop_assert!(hash.hash(&key).unwrap() <= mask(bits), "{}", hash);
                }
            }
        }
    }
}
