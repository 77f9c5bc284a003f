// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

use std::{hint::black_box, time::Duration};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use hashdist_benchmarks::algo::{catalog, ALL_FAMILIES, SUPPORTED_BITS};
use rand::{rngs::StdRng, RngCore, SeedableRng};

const BLOCK_SIZES: [usize; 3] = [8, 64, 1024];

fn hash_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("HashBlock");
    group.sampling_mode(SamplingMode::Flat);
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_millis(1000));

    let mut rng = StdRng::seed_from_u64(0);

    for block_size in BLOCK_SIZES {
        let mut block = vec![0; block_size];
        rng.fill_bytes(&mut block);
        group.throughput(Throughput::Bytes(block_size as u64));
        for bits in SUPPORTED_BITS {
            for hash in catalog(bits, &ALL_FAMILIES) {
                group.bench_with_input(
                    BenchmarkId::new(hash.to_string(), block_size),
                    &block,
                    |b, block| b.iter(|| hash.hash(black_box(block))),
                );
            }
        }
    }
    group.finish();
}

criterion_group!(benches, hash_block);
criterion_main!(benches);
