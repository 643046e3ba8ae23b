//! Timed-trial runner: warm-up, timed iterations, per-iteration samples.

use std::hint::black_box;
use std::time::{Duration, Instant};

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{BenchError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
}

impl BenchConfig {
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    /// Warm-up/iteration counts for the RAM copy suite.
    pub fn memory_trials(&self) -> TrialConfig {
        match self.profile {
            Profile::Quick => TrialConfig::new(10, 100),
            Profile::Full => TrialConfig::new(100, 1_000),
        }
    }

    /// Disk trials are never warmed up: each one starts from a flushed cache.
    pub fn disk_trials(&self) -> TrialConfig {
        match self.profile {
            Profile::Quick => TrialConfig::new(0, 3),
            Profile::Full => TrialConfig::new(0, 5),
        }
    }

    pub fn linalg_trials(&self) -> TrialConfig {
        match self.profile {
            Profile::Quick => TrialConfig::new(1, 5),
            Profile::Full => TrialConfig::new(3, 20),
        }
    }
}

/// How many times an operation is run, untimed and timed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialConfig {
    pub warmup_count: u64,
    pub iteration_count: u64,
}

impl TrialConfig {
    pub fn new(warmup_count: u64, iteration_count: u64) -> Self {
        Self {
            warmup_count,
            iteration_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.iteration_count == 0 {
            return Err(BenchError::invalid("iteration_count must be at least 1"));
        }
        Ok(())
    }
}

/// Elapsed time of every timed iteration, in execution order. Warm-up runs are not recorded.
#[derive(Clone, Debug)]
pub struct TrialResult {
    pub warmup_count: u64,
    pub samples: Vec<Duration>,
}

impl TrialResult {
    pub fn iteration_count(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    pub fn total_ns(&self) -> u128 {
        self.total().as_nanos()
    }

    pub fn ns_per_iter(&self) -> f64 {
        let denom = self.samples.len().max(1) as f64;
        (self.total_ns() as f64) / denom
    }

    pub fn mean_secs(&self) -> f64 {
        self.ns_per_iter() / 1e9
    }

    pub fn seconds(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(Duration::as_secs_f64)
    }
}

/// Run `op` through the configured warm-up and timed iterations.
///
/// Errors from `op` abort the trial and are returned unchanged; no partial result is produced.
pub fn run_trials<T, E, F>(config: &TrialConfig, mut op: F) -> std::result::Result<TrialResult, E>
where
    F: FnMut() -> std::result::Result<T, E>,
    E: From<BenchError>,
{
    run_trials_with_setup(config, || Ok(()), |()| op())
}

/// Like [`run_trials`], but runs `setup` before every iteration (warm-up included) outside the
/// timed region and hands its output to `op`.
pub fn run_trials_with_setup<S, T, E, Setup, F>(
    config: &TrialConfig,
    mut setup: Setup,
    mut op: F,
) -> std::result::Result<TrialResult, E>
where
    Setup: FnMut() -> std::result::Result<S, E>,
    F: FnMut(S) -> std::result::Result<T, E>,
    E: From<BenchError>,
{
    config.validate()?;

    for _ in 0..config.warmup_count {
        let input = setup()?;
        black_box(op(input)?);
    }

    let mut samples = Vec::with_capacity(config.iteration_count as usize);
    for _ in 0..config.iteration_count {
        let input = setup()?;
        let start = Instant::now();
        let out = op(input)?;
        samples.push(start.elapsed());
        black_box(out);
    }

    debug!(
        warmup = config.warmup_count,
        iterations = samples.len(),
        "trial finished"
    );

    Ok(TrialResult {
        warmup_count: config.warmup_count,
        samples,
    })
}

/// Convenience wrapper for infallible operations.
pub fn measure_fn<T>(config: &TrialConfig, mut f: impl FnMut() -> T) -> Result<TrialResult> {
    run_trials(config, || Ok::<T, BenchError>(f()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn records_exactly_iteration_count_samples() {
        for (warmup, iters) in [(0, 1), (3, 7), (10, 2)] {
            let calls = Cell::new(0u64);
            let result = measure_fn(&TrialConfig::new(warmup, iters), || {
                calls.set(calls.get() + 1);
            })
            .unwrap();
            assert_eq!(result.samples.len() as u64, iters);
            assert_eq!(calls.get(), warmup + iters);
            assert!(result.seconds().all(|s| s >= 0.0));
        }
    }

    #[test]
    fn zero_iterations_is_rejected_before_running() {
        let calls = Cell::new(0u64);
        let err = measure_fn(&TrialConfig::new(5, 0), || calls.set(calls.get() + 1)).unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfiguration(_)));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn operation_failure_propagates() {
        let mut n = 0;
        let res = run_trials(&TrialConfig::new(0, 5), || {
            n += 1;
            if n == 3 {
                Err(BenchError::invalid("boom"))
            } else {
                Ok(())
            }
        });
        assert!(res.is_err());
        assert_eq!(n, 3);
    }

    #[test]
    fn setup_runs_outside_timed_region_for_every_trial() {
        let setups = Cell::new(0u64);
        let result = run_trials_with_setup(
            &TrialConfig::new(2, 3),
            || {
                setups.set(setups.get() + 1);
                Ok::<_, BenchError>(setups.get())
            },
            |n| Ok::<_, BenchError>(n * 2),
        )
        .unwrap();
        assert_eq!(setups.get(), 5);
        assert_eq!(result.iteration_count(), 3);
        assert_eq!(result.warmup_count, 2);
    }

    #[test]
    fn profile_trial_defaults_are_valid() {
        for profile in [Profile::Quick, Profile::Full] {
            let cfg = BenchConfig { profile, seed: 0 };
            for t in [cfg.memory_trials(), cfg.disk_trials(), cfg.linalg_trials()] {
                t.validate().unwrap();
            }
        }
    }
}
