use RustedUsadel::Examples::usadel_examples::usadel_examples;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_normal_metal(c: &mut Criterion) {
    c.bench_function("normal metal sweep", |b| b.iter(|| usadel_examples(black_box(0))));
}

fn bench_spin_active(c: &mut Criterion) {
    let mut group = c.benchmark_group("SF spin-active");
    group.sample_size(10);
    group.bench_function("example 2", |b| b.iter(|| usadel_examples(black_box(2))));
    group.finish();
}

criterion_group!(benches, bench_normal_metal, bench_spin_active);
criterion_main!(benches);
