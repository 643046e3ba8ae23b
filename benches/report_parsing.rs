//! Report parsing benchmark suite
//!
//! Benchmarks for scraping rates out of `dd` status text.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use perf_bench::report_parser::parse;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_parser");

    let reports = vec![
        (
            "gnu",
            "4096+0 records in\n4096+0 records out\n16777216 bytes (17 MB, 16 MiB) copied, 0.0409 s, 410 MB/s\n",
        ),
        ("comma", "16777216 Bytes (17 MB, 16 MiB) kopiert, 0,0133 s, 1,3 GB/s\n"),
        ("busybox", "16777216 bytes (16.0MB) copied, 0.021442 seconds, 746.2MB/s\n"),
        ("unmatched", "dd: error writing 'out.dd': No space left on device\n"),
    ];

    for (label, text) in reports {
        group.bench_with_input(BenchmarkId::new("parse", label), &text, |bencher, text| {
            bencher.iter(|| black_box(parse(black_box(text))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
