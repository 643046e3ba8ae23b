//! Bytes-per-second conversion and per-sample bandwidth aggregation.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::harness::TrialResult;

/// Binary-prefixed bandwidth unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum BandwidthUnit {
    #[serde(rename = "MiB/s")]
    #[value(name = "mib")]
    MiB,
    #[default]
    #[serde(rename = "GiB/s")]
    #[value(name = "gib")]
    GiB,
}

impl BandwidthUnit {
    pub fn divisor(self) -> f64 {
        match self {
            BandwidthUnit::MiB => 1024f64.powi(2),
            BandwidthUnit::GiB => 1024f64.powi(3),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BandwidthUnit::MiB => "MiB/s",
            BandwidthUnit::GiB => "GiB/s",
        }
    }
}

/// `bytes_moved / elapsed_seconds` in `unit`.
///
/// Returns `None` when `elapsed_seconds` is not positive: the clock was too coarse to time the
/// operation and no finite figure would be meaningful.
pub fn bandwidth(bytes_moved: u64, elapsed_seconds: f64, unit: BandwidthUnit) -> Option<f64> {
    if elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 {
        return None;
    }
    Some(bytes_moved as f64 / elapsed_seconds / unit.divisor())
}

/// One trial's bandwidth. Immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSample {
    pub bytes_moved: u64,
    pub elapsed_seconds: f64,
    pub bandwidth: f64,
    pub unit: BandwidthUnit,
}

impl ThroughputSample {
    pub fn new(bytes_moved: u64, elapsed: Duration, unit: BandwidthUnit) -> Option<Self> {
        let elapsed_seconds = elapsed.as_secs_f64();
        bandwidth(bytes_moved, elapsed_seconds, unit).map(|bandwidth| Self {
            bytes_moved,
            elapsed_seconds,
            bandwidth,
            unit,
        })
    }
}

/// Mean and population standard deviation of per-sample bandwidth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub unit: BandwidthUnit,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Samples that contributed to the figures above.
    pub samples: usize,
    /// Samples dropped because their elapsed time was zero.
    pub degenerate: usize,
}

impl BandwidthStats {
    /// Aggregate raw bandwidth values. Returns `None` for an empty slice.
    pub fn from_values(values: &[f64], unit: BandwidthUnit, degenerate: usize) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            unit,
            mean,
            std_dev: var.sqrt(),
            min,
            max,
            samples: values.len(),
            degenerate,
        })
    }
}

/// Per-sample bandwidth for every timed iteration that moved `bytes_moved` bytes.
pub fn samples_of(
    result: &TrialResult,
    bytes_moved: u64,
    unit: BandwidthUnit,
) -> Vec<Option<ThroughputSample>> {
    result
        .samples
        .iter()
        .map(|d| ThroughputSample::new(bytes_moved, *d, unit))
        .collect()
}

/// Aggregate the bandwidth of a trial. Degenerate (zero-time) samples are excluded and counted.
pub fn summarize(
    result: &TrialResult,
    bytes_moved: u64,
    unit: BandwidthUnit,
) -> Option<BandwidthStats> {
    let samples = samples_of(result, bytes_moved, unit);
    let values: Vec<f64> = samples.iter().flatten().map(|s| s.bandwidth).collect();
    let degenerate = samples.len() - values.len();
    BandwidthStats::from_values(&values, unit, degenerate)
}
