//! Benchmarks for the name generator and the class-file decode path.

extern crate classcloak;

use std::collections::HashSet;

use classcloak::classfile::ClassFile;
use classcloak::rename::NameGenerator;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// Benchmark drawing a long run of fresh names from one generator stream.
fn bench_generator_stream(c: &mut Criterion) {
    c.bench_function("namegen_10k_names", |b| {
        b.iter(|| {
            let mut generator = NameGenerator::new();
            let exclude = HashSet::new();
            for _ in 0..10_000 {
                black_box(generator.next(black_box(&exclude)));
            }
        });
    });
}

/// Benchmark drawing names against a populated avoid-set.
fn bench_generator_with_exclusions(c: &mut Criterion) {
    let exclude: HashSet<String> = (0..512).map(|n| format!("m{n}")).collect();
    c.bench_function("namegen_1k_names_excluded", |b| {
        b.iter(|| {
            let mut generator = NameGenerator::new();
            for _ in 0..1_000 {
                black_box(generator.next(black_box(&exclude)));
            }
        });
    });
}

/// A minimal, valid class file: one Utf8/Class pair for this and super.
fn minimal_class_bytes() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(0xCAFE_BABEu32.to_be_bytes());
    out.extend(0u16.to_be_bytes());
    out.extend(52u16.to_be_bytes());
    out.extend(5u16.to_be_bytes()); // pool count (4 entries)
    for name in ["demo/Bench", "java/lang/Object"] {
        out.push(1);
        out.extend((name.len() as u16).to_be_bytes());
        out.extend(name.as_bytes());
    }
    out.push(7);
    out.extend(1u16.to_be_bytes());
    out.push(7);
    out.extend(2u16.to_be_bytes());
    out.extend(0x0021u16.to_be_bytes()); // access
    out.extend(3u16.to_be_bytes()); // this
    out.extend(4u16.to_be_bytes()); // super
    out.extend(0u16.to_be_bytes()); // interfaces
    out.extend(0u16.to_be_bytes()); // fields
    out.extend(0u16.to_be_bytes()); // methods
    out.extend(0u16.to_be_bytes()); // attributes
    out
}

/// Benchmark the full decode of a minimal class file.
fn bench_decode_minimal(c: &mut Criterion) {
    let bytes = minimal_class_bytes();
    c.bench_function("decode_minimal_class", |b| {
        b.iter(|| {
            let file = ClassFile::decode(black_box(&bytes)).unwrap();
            black_box(file)
        });
    });
}

criterion_group!(
    benches,
    bench_generator_stream,
    bench_generator_with_exclusions,
    bench_decode_minimal
);
criterion_main!(benches);
