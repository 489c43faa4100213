#![allow(
    clippy::unwrap_used,
    clippy::default_numeric_fallback,
    reason = "benchmark"
)]

use {
    criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main},
    tdstore_sdk::{
        LocalKey,
        crypto::{EncryptedDescriptor, decrypt_local, encrypt_local},
    },
};

fn descriptor(size: usize) -> EncryptedDescriptor {
    let input = (0..size).map(|_| rand::random::<u8>()).collect::<Vec<u8>>();
    let mut descriptor = EncryptedDescriptor::with_capacity(size + 4);
    descriptor.stream().write_bytes(&input);
    descriptor
}

fn criterion_benchmark(c: &mut Criterion) {
    let key = LocalKey::generate();

    let mut group = c.benchmark_group("encrypt_local");
    for size in [1024, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || descriptor(size),
                |input| encrypt_local(input, &key),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let mut group = c.benchmark_group("decrypt_local");
    for size in [1024, 1024 * 1024] {
        let encrypted = encrypt_local(descriptor(size), &key);
        group.bench_with_input(BenchmarkId::from_parameter(size), &encrypted, |b, encrypted| {
            b.iter(|| decrypt_local(encrypted, &key).unwrap());
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
