// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Whole-keyspace bucket counting.
//!
//! The key space `0..key_count` is split into contiguous chunks, one per
//! worker. Workers hash their keys independently and increment shared atomic
//! counters. Increments commute, so the final counts do not depend on how the
//! workers interleave.

use std::{
    num::NonZeroUsize,
    ops::Range,
    panic,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    thread,
    time::Instant,
};

use tracing::{debug, info};

use crate::{
    error::Error,
    hasher::HashFunction,
    modify::BucketMap,
    params::{CheckParameters, Parameters},
};

// Workers poll the abort flag once per batch of keys.
const ABORT_POLL_INTERVAL: u64 = 1 << 12;

/// Per-bucket hit counts of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketArray {
    counts: Vec<u64>,
}

impl BucketArray {
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Hashes every key of a [`CheckParameters`] key space on a pool of workers.
#[derive(Clone, Copy, Debug)]
pub struct BucketCounter {
    workers: NonZeroUsize,
}

impl BucketCounter {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    /// Uses one worker per available hardware thread.
    pub fn with_available_parallelism() -> Self {
        Self::new(available_parallelism())
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Counts the buckets hit by keys `0..key_count`.
    ///
    /// Each key is hashed as its 8 little-endian bytes. If the hash function
    /// fails for any key, the remaining workers stop and no counts are
    /// returned.
    pub fn count<H>(&self, hash: &H, params: &CheckParameters) -> Result<BucketArray, Error>
    where
        H: HashFunction + ?Sized,
    {
        let started = Instant::now();
        let buckets = (0..params.buckets_count())
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>();
        let bucket_map = params.bucket_map();
        let aborted = AtomicBool::new(false);

        thread::scope(|scope| {
            let handles = partition(params.key_count(), self.workers)
                .map(|keys| {
                    let (buckets, aborted) = (&buckets, &aborted);
                    scope.spawn(move || {
                        let outcome = count_keys(hash, bucket_map, keys, buckets, aborted);
                        if outcome.is_err() {
                            aborted.store(true, Ordering::Relaxed);
                        }
                        outcome
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|err| panic::resume_unwind(err)))
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Result<(), Error>>()
        })?;

        let counts = buckets
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect::<Vec<_>>();
        info!(
            hash = %hash,
            keys = params.key_count(),
            elapsed = ?started.elapsed(),
            "counted buckets"
        );
        Ok(BucketArray { counts })
    }
}

impl Default for BucketCounter {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

pub(crate) fn available_parallelism() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn count_keys<H>(
    hash: &H,
    bucket_map: BucketMap,
    keys: Range<u64>,
    buckets: &[AtomicU64],
    aborted: &AtomicBool,
) -> Result<(), Error>
where
    H: HashFunction + ?Sized,
{
    debug!(start = keys.start, end = keys.end, "worker started");
    for key in keys {
        if key % ABORT_POLL_INTERVAL == 0 && aborted.load(Ordering::Relaxed) {
            break;
        }
        let raw = hash.hash(&key.to_le_bytes()).map_err(|source| Error::Hash {
            name: hash.to_string(),
            source,
        })?;
        let bucket = bucket_map.bucket(raw);
        usize::try_from(bucket)
            .ok()
            .and_then(|index| buckets.get(index))
            .ok_or_else(|| Error::BucketOutOfRange {
                name: hash.to_string(),
                bucket,
                buckets: buckets.len() as u64,
            })?
            .fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

/// Splits `0..len` into at most `parts` contiguous, non-empty ranges whose
/// lengths differ by at most one.
fn partition(len: u64, parts: NonZeroUsize) -> impl Iterator<Item = Range<u64>> {
    let parts = (parts.get() as u64).min(len).max(1);
    let (base, remainder) = (len / parts, len % parts);
    (0..parts)
        .scan(0, move |start, index| {
            let end = *start + base + u64::from(index < remainder);
            let range = *start..end;
            *start = end;
            Some(range)
        })
        .filter(|range| !range.is_empty())
}
