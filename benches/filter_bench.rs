// Bloom filter add/test benchmarks for bloomgate

use bloomgate::config::FilterParams;
use bloomgate::filter::{BloomFilter, Filter};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::hint::black_box;

fn benchmark_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_add");

    for k in [3usize, 7, 20].iter() {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            let keys: Vec<String> = (0..1000).map(|i| format!("key{:08}", i)).collect();
            b.iter(|| {
                let mut filter = BloomFilter::with_params(FilterParams::new(k, 1000, 2)).unwrap();
                for key in &keys {
                    filter.add(key.as_bytes());
                }
                black_box(&filter);
            });
        });
    }

    group.finish();
}

fn benchmark_may_contain(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_may_contain");

    for k in [3usize, 7, 20].iter() {
        let mut filter = BloomFilter::with_params(FilterParams::new(*k, 10_000, 2)).unwrap();
        for i in 0..10_000 {
            filter.add(format!("key{:08}", i).as_bytes());
        }

        let mut rng = rand::rng();
        let probes: Vec<String> = (0..1000)
            .map(|_| format!("key{:08}", rng.random_range(0..20_000u32)))
            .collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(k), &probes, |b, probes| {
            b.iter(|| {
                for probe in probes {
                    black_box(filter.may_contain(probe.as_bytes()));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_add, benchmark_may_contain);
criterion_main!(benches);
