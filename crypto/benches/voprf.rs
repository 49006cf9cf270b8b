// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! Benchmarks for client-side VOPRF operations
//!
//! - hash-to-curve of fresh seeds
//! - blinding and unblinding (scalar multiplication and inversion)
//! - batched DLEQ verification at the batch sizes an issuer returns
//!
//! Run with: cargo bench --bench voprf --features test-issuer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use p256::elliptic_curve::ops::Invert;
use p256::{NonZeroScalar, ProjectivePoint};
use privpass_crypto::testing::TestIssuer;
use privpass_crypto::voprf::dleq::verify_batch;
use privpass_crypto::{HashToCurve, Sswu};
use rand_core::OsRng;

fn bench_hash_to_curve(c: &mut Criterion) {
    let mut group = c.benchmark_group("voprf/hash_to_curve");
    let h2c = Sswu::default();

    for size in [16, 32, 64, 128].iter() {
        let input = vec![0xABu8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(h2c.hash_to_curve(black_box(&input))))
        });
    }
    group.finish();
}

fn bench_blind_unblind(c: &mut Criterion) {
    let mut group = c.benchmark_group("voprf/blind");
    let point = Sswu::default().hash_to_curve(b"bench seed").unwrap();
    let blind = NonZeroScalar::random(&mut OsRng);
    let blinded = point * *blind;

    group.bench_function("blind", |b| {
        b.iter(|| {
            let r = NonZeroScalar::random(&mut OsRng);
            black_box(point * *r)
        })
    });
    group.bench_function("unblind", |b| {
        b.iter(|| black_box(blinded * *blind.invert()))
    });
    group.finish();
}

fn bench_batch_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("voprf/batch_verify");
    let issuer = TestIssuer::random(&mut OsRng);
    let y = issuer.public_key().to_affine();

    for batch_size in [1usize, 10, 30, 100].iter() {
        let blinded: Vec<ProjectivePoint> = (0..*batch_size)
            .map(|_| ProjectivePoint::GENERATOR * *NonZeroScalar::random(&mut OsRng))
            .collect();
        let (signed, proof) = issuer.sign_with_proof(&blinded, &mut OsRng).unwrap();

        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, _| b.iter(|| black_box(verify_batch(&y, &blinded, &signed, &proof, None))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_hash_to_curve, bench_blind_unblind, bench_batch_verify);
criterion_main!(benches);
