//! Benchmark suite for the identifier and AEAD primitives the rest of the
//! workspace is built on.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dht_crypto::{random_id, seal, open, Id, KeyPair};

fn benchmark_random_id(c: &mut Criterion) {
    c.bench_function("random_id", |b| {
        b.iter(random_id);
    });
}

fn benchmark_distance(c: &mut Criterion) {
    let a = random_id();
    let b_id = random_id();
    c.bench_function("xor_distance", |b| {
        b.iter(|| black_box(a).distance(&black_box(b_id)));
    });
}

fn benchmark_id_for_key(c: &mut Criterion) {
    let key = b"benchmark-key-for-hashing-into-id-space";
    c.bench_function("id_for_key", |b| {
        b.iter(|| Id::for_key(black_box(key)));
    });
}

fn benchmark_keypair_generation(c: &mut Criterion) {
    c.bench_function("keypair_generation", |b| {
        b.iter(KeyPair::generate);
    });
}

fn benchmark_seal(c: &mut Criterion) {
    let local = KeyPair::generate();
    let recipient = KeyPair::generate().public_id();
    let plaintext = b"benchmark payload for the curve-authenticated transport framer";
    c.bench_function("seal", |b| {
        b.iter(|| seal(&local, &recipient, black_box(plaintext)));
    });
}

fn benchmark_open(c: &mut Criterion) {
    let local = KeyPair::generate();
    let remote = KeyPair::generate();
    let plaintext = b"benchmark payload for the curve-authenticated transport framer";
    let sealed = seal(&remote, &local.public_id(), plaintext);
    c.bench_function("open", |b| {
        b.iter(|| open(&local, &remote.public_id(), black_box(&sealed)).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_random_id,
    benchmark_distance,
    benchmark_id_for_key,
    benchmark_keypair_generation,
    benchmark_seal,
    benchmark_open,
);
criterion_main!(benches);
