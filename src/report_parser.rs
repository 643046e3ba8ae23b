//! Throughput extraction from the status text printed by `dd`.
//!
//! `dd` reports its transfer rate on stderr in a locale- and version-dependent form, e.g.
//! `16777216 bytes (17 MB, 16 MiB) copied, 0.0409 s, 410 MB/s` or `... 1,2 GB/s`.
//! The first `<number> <unit>/s` occurrence is taken and normalized to MB/s (base 1024).

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RateUnit {
    Bytes,
    KB,
    MB,
    GB,
}

impl RateUnit {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "bytes" => Some(RateUnit::Bytes),
            "kb" => Some(RateUnit::KB),
            "mb" => Some(RateUnit::MB),
            "gb" => Some(RateUnit::GB),
            _ => None,
        }
    }

    /// Convert `value` in this unit to MB (1 MB = 1024 KB = 1048576 bytes).
    pub fn to_mb(self, value: f64) -> f64 {
        match self {
            RateUnit::Bytes => value / (1024.0 * 1024.0),
            RateUnit::KB => value / 1024.0,
            RateUnit::MB => value,
            RateUnit::GB => value * 1024.0,
        }
    }
}

/// Result of scanning one report.
///
/// When nothing matched, `matched` is false, the raw fields are `None` and `normalized_mbps`
/// is 0.0. Use [`ParsedReport::throughput_mbps`] to avoid mistaking that for a measured zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedReport {
    pub raw_value: Option<f64>,
    pub raw_unit: Option<RateUnit>,
    pub normalized_mbps: f64,
    pub matched: bool,
}

impl ParsedReport {
    fn unmatched() -> Self {
        Self {
            raw_value: None,
            raw_unit: None,
            normalized_mbps: 0.0,
            matched: false,
        }
    }

    pub fn throughput_mbps(&self) -> Option<f64> {
        self.matched.then_some(self.normalized_mbps)
    }
}

fn rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(bytes|KB|MB|GB)/s").expect("rate pattern is valid")
    })
}

pub fn parse(report_text: &str) -> ParsedReport {
    let Some(caps) = rate_pattern().captures(report_text) else {
        return ParsedReport::unmatched();
    };

    let value = caps[1].replace(',', ".").parse::<f64>().ok();
    let unit = RateUnit::from_token(&caps[2]);
    match (value, unit) {
        (Some(value), Some(unit)) => ParsedReport {
            raw_value: Some(value),
            raw_unit: Some(unit),
            normalized_mbps: unit.to_mb(value),
            matched: true,
        },
        _ => ParsedReport::unmatched(),
    }
}
