use serde::{Deserialize, Serialize};

use crate::harness::TrialResult;
use crate::throughput::BandwidthStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub unit: String,

    pub iters: u64,
    pub warmup_iters: u64,

    /// `None` when the elapsed time was not measured by this process (external tool rates).
    pub total_ns: Option<u128>,
    pub ns_per_iter: Option<f64>,

    pub bytes_processed: Option<u64>,
    pub throughput: Option<BandwidthStats>,

    pub extra: serde_json::Value,
}

impl Measurement {
    /// Timing fields from `trials`; throughput and extras are left empty.
    pub fn from_trials(name: impl Into<String>, trials: &TrialResult) -> Self {
        Self {
            name: name.into(),
            unit: "ns/iter".to_string(),
            iters: trials.iteration_count(),
            warmup_iters: trials.warmup_count,
            total_ns: Some(trials.total_ns()),
            ns_per_iter: Some(trials.ns_per_iter()),
            bytes_processed: None,
            throughput: None,
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_throughput(mut self, bytes: u64, stats: Option<BandwidthStats>) -> Self {
        self.bytes_processed = Some(bytes);
        self.throughput = stats;
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

/// A data point that could not be measured. The rest of the run is unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub measurements: Vec<Measurement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MeasurementFailure>,
}
