use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vecstore::services::{VectorCodec, cosine_distance, normalize, to_batches};

fn sample(dimensions: usize, seed: f32) -> Vec<f32> {
    (0..dimensions).map(|i| ((i as f32) * seed).sin()).collect()
}

fn bench_codec(c: &mut Criterion) {
    let vector = sample(1024, 0.37);
    let other = sample(1024, 0.91);
    let codec = VectorCodec::new(1024);

    c.bench_function("normalize_1024", |b| b.iter(|| normalize(black_box(&vector))));
    c.bench_function("cosine_distance_1024", |b| {
        b.iter(|| cosine_distance(black_box(&vector), black_box(&other)))
    });
    c.bench_function("to_storage_form_1024", |b| {
        b.iter(|| codec.to_storage_form(black_box(&vector)))
    });
}

fn bench_batches(c: &mut Criterion) {
    let items: Vec<u32> = (0..10_000).collect();
    c.bench_function("to_batches_10k_by_50", |b| {
        b.iter(|| to_batches(black_box(&items), 50).map(|batches| batches.len()))
    });
}

criterion_group!(benches, bench_codec, bench_batches);
criterion_main!(benches);
