use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use csv_dynamic::{LookupStrategy, NameLookup, heap_pool};
use std::hint::black_box;

fn header(width: usize) -> Vec<String> {
    (0..width)
        .map(|i| match i % 4 {
            0 => format!("customer_{i}"),
            1 => format!("order_{i}_total"),
            2 => format!("shipped_at_{i}"),
            _ => format!("c{i}"),
        })
        .collect()
}

fn bench_name_lookup(c: &mut Criterion) {
    let pool = heap_pool();
    let mut group = c.benchmark_group("name_lookup");
    for width in [8usize, 64, 512] {
        let names = header(width);
        let queries: Vec<&str> = names.iter().rev().step_by(3).map(String::as_str).collect();
        let trie = NameLookup::create(&names, &pool).expect("trie");
        let table =
            NameLookup::create_with(&names, &pool, LookupStrategy::BinarySearch).expect("table");

        group.bench_with_input(BenchmarkId::new("trie", width), &queries, |b, queries| {
            b.iter(|| {
                for query in queries {
                    black_box(trie.try_lookup(query));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("binary_search", width), &queries, |b, queries| {
            b.iter(|| {
                for query in queries {
                    black_box(table.try_lookup(query));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("linear_scan", width), &queries, |b, queries| {
            b.iter(|| {
                for query in queries {
                    black_box(names.iter().position(|name| name == query));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_name_lookup);
criterion_main!(benches);
