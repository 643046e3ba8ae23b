//! Plain-text tables for terminal output.

use std::fmt::Write;

use crate::benches::disk::{BlockSizeResult, Series};
use crate::schema::Measurement;

fn cell(s: &Series) -> String {
    match (&s.stats, &s.error) {
        (Some(st), _) => format!("{:<10.2}\u{00B1}{:<14.2}", st.mean, st.std_dev),
        (None, Some(_)) => format!("{:<25}", "failed"),
        (None, None) => format!("{:<25}", "n/a"),
    }
}

/// Block size vs `mean ± std` MiB/s for sequential write and read.
pub fn disk_table(results: &[BlockSizeResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<15}{:<25}{:<25}",
        "Block Size", "Sequential Write (MB/s)", "Sequential Read (MB/s)"
    );
    let _ = writeln!(out, "{}", "=".repeat(65));
    for r in results {
        let _ = writeln!(
            out,
            "{:<15}{}{}",
            r.block_size,
            cell(&r.write),
            cell(&r.read)
        );
    }
    out
}

/// Name, mean time per iteration and bandwidth (when measured) per row.
pub fn measurement_table(measurements: &[Measurement]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<44}{:>16}  {}", "Benchmark", "Mean time (s)", "Result");
    let _ = writeln!(out, "{}", "=".repeat(90));
    for m in measurements {
        let result = match (&m.throughput, m.extra.get("gflops").and_then(|v| v.as_f64())) {
            (Some(t), _) => format!(
                "{:.2} \u{00B1} {:.2} {}",
                t.mean,
                t.std_dev,
                t.unit.as_str()
            ),
            (None, Some(g)) => format!("{g:.2} GFLOP/s"),
            (None, None) => "-".to_string(),
        };
        let mean = m
            .ns_per_iter
            .map_or_else(|| "-".to_string(), |ns| format!("{:.6}", ns / 1e9));
        let _ = writeln!(out, "{:<44}{:>16}  {}", m.name, mean, result);
    }
    out
}
