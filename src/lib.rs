use clap::ValueEnum;

pub mod benches;
pub mod cache;
pub mod copy;
pub mod error;
pub mod external;
pub mod harness;
pub mod partition;
pub mod report;
pub mod report_parser;
pub mod schema;
pub mod throughput;

pub use error::{BenchError, FlushError, Result};

/// Benchmark family to run as part of a suite.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum BenchKind {
    /// Memory, disk and CPU benchmarks.
    #[default]
    All,
    /// RAM-to-RAM copy bandwidth, single and split across workers.
    Memory,
    /// Sequential write/read throughput per block size.
    Disk,
    /// Dense linear algebra GFLOP/s.
    Cpu,
}

impl BenchKind {
    pub fn includes(&self, other: BenchKind) -> bool {
        *self == BenchKind::All || *self == other
    }
}
