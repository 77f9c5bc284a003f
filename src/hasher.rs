// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use std::fmt;

use crate::error::CapabilityError;

/// A hash function under evaluation.
///
/// The display name identifies the function in reports. Implementations must
/// be deterministic; the engines rely on it but do not check it.
pub trait HashFunction: fmt::Display + Sync {
    /// Width of the produced values, in bits.
    fn bits(&self) -> u32;

    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError>;
}

impl<H: HashFunction + ?Sized> HashFunction for &H {
    fn bits(&self) -> u32 {
        (**self).bits()
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        (**self).hash(key)
    }
}

impl<H: HashFunction + ?Sized> HashFunction for Box<H> {
    fn bits(&self) -> u32 {
        (**self).bits()
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> Result<u64, CapabilityError> {
        (**self).hash(key)
    }
}
