use criterion::{Criterion, criterion_group, criterion_main};
use mgl_assist::index::FlatIndex;
use std::hint::black_box;

/// Deterministic synthetic vector; no two positions share a direction.
fn synthetic_vector(position: usize, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|axis| ((position * 31 + axis * 17) % 97) as f32 / 97.0)
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let dimension = 256;
    let count = 5_000;

    let mut index = FlatIndex::new(dimension).expect("dimension is non-zero");
    for position in 0..count {
        index
            .push(&synthetic_vector(position, dimension))
            .expect("vector length matches index dimension");
    }
    let query = synthetic_vector(count, dimension);

    c.bench_function("flat_search_top3", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });
    c.bench_function("flat_search_top50", |b| {
        b.iter(|| index.search(black_box(&query), black_box(50)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
