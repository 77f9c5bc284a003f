// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use std::error::Error as StdError;

use thiserror::Error;

use crate::params::Mode;

/// Broad category of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested parameters cannot be evaluated. Raised before any work
    /// is scheduled.
    Configuration,
    /// A hash function or a block source failed while a run was in
    /// progress. The run is aborted and nothing is reported for it.
    Runtime,
    /// A report sink failed to persist a finished result.
    Report,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{mode} mode does not support {test_bits}-bit tests")]
    UnsupportedWidth { mode: Mode, test_bits: u32 },

    #[error("a {test_bits}-bit window shifted by {shift} does not fit in a {hash_bits}-bit hash")]
    MaskOutOfRange {
        shift: u32,
        test_bits: u32,
        hash_bits: u32,
    },

    #[error("{mode} mode needs a {test_bits}-bit hash, got a {hash_bits}-bit one")]
    WidthMismatch {
        mode: Mode,
        hash_bits: u32,
        test_bits: u32,
    },

    #[error("{mode} mode is not supported by this test")]
    UnsupportedMode { mode: Mode },

    #[error("cannot split {buckets} buckets into {bars} bars")]
    TooFewBuckets { buckets: usize, bars: usize },

    #[error("invalid bins table: {0}")]
    InvalidBinsTable(String),

    #[error("hash function {name} failed")]
    Hash {
        name: String,
        #[source]
        source: CapabilityError,
    },

    #[error("block source failed")]
    BlockSource {
        #[source]
        source: CapabilityError,
    },

    #[error("hash function {name} produced bucket {bucket}, outside of 0..{buckets}")]
    BucketOutOfRange {
        name: String,
        bucket: u64,
        buckets: u64,
    },

    #[error("failed to write report")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedWidth { .. }
            | Error::MaskOutOfRange { .. }
            | Error::WidthMismatch { .. }
            | Error::UnsupportedMode { .. }
            | Error::TooFewBuckets { .. }
            | Error::InvalidBinsTable(_) => ErrorKind::Configuration,
            Error::Hash { .. } | Error::BlockSource { .. } | Error::BucketOutOfRange { .. } => {
                ErrorKind::Runtime
            }
            Error::Sink(_) => ErrorKind::Report,
        }
    }

    /// Wraps an error raised by a [`ReportSink`](crate::report::ReportSink).
    pub fn sink(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error::Sink(error.into())
    }
}

/// Failure reported by a hash function or a block source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Error::UnsupportedWidth { mode: Mode::Normal, test_bits: 20 }, ErrorKind::Configuration)]
    #[test_case(Error::UnsupportedMode { mode: Mode::Bins }, ErrorKind::Configuration)]
    #[test_case(Error::BlockSource { source: CapabilityError::new("exhausted") }, ErrorKind::Runtime)]
    #[test_case(Error::BucketOutOfRange { name: "h".into(), bucket: 9, buckets: 4 }, ErrorKind::Runtime)]
    #[test_case(Error::sink("disk full"), ErrorKind::Report)]
    fn kinds(error: Error, kind: ErrorKind) {
        assert_eq!(error.kind(), kind);
    }

    #[test]
    fn messages() {
        assert_eq!(
            Error::MaskOutOfRange {
                shift: 16,
                test_bits: 24,
                hash_bits: 32
            }
            .to_string(),
            "a 24-bit window shifted by 16 does not fit in a 32-bit hash"
        );
        assert_eq!(
            Error::UnsupportedWidth {
                mode: Mode::Normal,
                test_bits: 20
            }
            .to_string(),
            "Normal mode does not support 20-bit tests"
        );
    }
}
