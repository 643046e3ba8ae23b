//! Parallel split-copy engine.
//!
//! One large `src -> dst` copy is cut into contiguous chunks with [`WorkPartition`] and every
//! worker copies only its own chunk. Chunks are disjoint slices, so no locking is involved.
//!
//! In [`CopyMode::ThreadPerPass`] the workers are spawned at the start of every pass and joined
//! at its end, so the measured time includes thread start-up and join cost. [`CopyMode::Pooled`]
//! reuses a rayon pool built once per engine and therefore reports a different metric.

use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::harness::{run_trials, TrialConfig, TrialResult};
use crate::partition::WorkPartition;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyMode {
    /// Spawn and join fresh workers on every pass.
    #[default]
    ThreadPerPass,
    /// Persistent worker pool shared by all passes.
    Pooled,
}

impl CopyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyMode::ThreadPerPass => "thread_per_pass",
            CopyMode::Pooled => "pooled",
        }
    }
}

pub struct SplitCopyEngine {
    partition: WorkPartition,
    mode: CopyMode,
    pool: Option<ThreadPool>,
}

impl SplitCopyEngine {
    /// Partition a buffer of `len` elements over `worker_count` workers.
    pub fn new(len: usize, worker_count: usize, mode: CopyMode) -> Result<Self> {
        let partition = WorkPartition::new(len, worker_count)?;
        let pool = match mode {
            CopyMode::ThreadPerPass => None,
            CopyMode::Pooled => Some(
                ThreadPoolBuilder::new()
                    .num_threads(worker_count)
                    .thread_name(|i| format!("split-copy-{i}"))
                    .build()?,
            ),
        };
        Ok(Self {
            partition,
            mode,
            pool,
        })
    }

    pub fn partition(&self) -> &WorkPartition {
        &self.partition
    }

    pub fn mode(&self) -> CopyMode {
        self.mode
    }

    fn check_buffers<T>(&self, src: &[T], dst: &[T]) -> Result<()> {
        if src.len() != dst.len() {
            return Err(BenchError::invalid(format!(
                "source ({}) and destination ({}) lengths differ",
                src.len(),
                dst.len()
            )));
        }
        if src.len() != self.partition.len() {
            return Err(BenchError::invalid(format!(
                "buffer length {} does not match partitioned length {}",
                src.len(),
                self.partition.len()
            )));
        }
        Ok(())
    }

    /// One untimed pass. Returns once every worker has finished its chunk.
    fn copy_once<T: Copy + Send + Sync>(&self, src: &[T], dst: &mut [T]) {
        let src_chunks = self.partition.split(src);
        let dst_chunks = self.partition.split_mut(dst);

        match &self.pool {
            None => thread::scope(|s| {
                for (from, to) in src_chunks.into_iter().zip(dst_chunks) {
                    s.spawn(move || to.copy_from_slice(from));
                }
            }),
            Some(pool) => {
                let pairs: Vec<(&[T], &mut [T])> = src_chunks.into_iter().zip(dst_chunks).collect();
                pool.install(|| {
                    pairs
                        .into_par_iter()
                        .with_max_len(1)
                        .for_each(|(from, to)| to.copy_from_slice(from))
                });
            }
        }
    }

    /// One timed pass, measured from before the first worker starts until the last one is joined.
    pub fn pass<T: Copy + Send + Sync>(&self, src: &[T], dst: &mut [T]) -> Result<Duration> {
        self.check_buffers(src, dst)?;
        let start = Instant::now();
        self.copy_once(src, dst);
        Ok(start.elapsed())
    }

    /// Warm-up passes followed by timed passes, all over the same partition.
    pub fn run<T: Copy + Send + Sync>(
        &self,
        src: &[T],
        dst: &mut [T],
        trials: &TrialConfig,
    ) -> Result<TrialResult> {
        trials.validate()?;
        self.check_buffers(src, dst)?;
        debug!(
            workers = self.partition.worker_count(),
            mode = self.mode.as_str(),
            elements = src.len(),
            "split copy"
        );
        run_trials(trials, || {
            self.copy_once(src, &mut *dst);
            Ok::<(), BenchError>(())
        })
    }
}

/// Copy `src` into `dst` with `worker_count` fresh threads and return the wall-clock time of
/// the pass.
pub fn parallel_copy<T: Copy + Send + Sync>(
    src: &[T],
    dst: &mut [T],
    worker_count: usize,
) -> Result<Duration> {
    SplitCopyEngine::new(src.len(), worker_count, CopyMode::ThreadPerPass)?.pass(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(len: usize) -> Vec<u32> {
        (0..len as u32).map(|i| i.wrapping_mul(2654435761)).collect()
    }

    #[test]
    fn every_element_is_copied() {
        for workers in [1, 2, 3, 7, 16] {
            let src = source(1003);
            let mut dst = vec![0u32; src.len()];
            parallel_copy(&src, &mut dst, workers).unwrap();
            assert_eq!(src, dst);
        }
    }

    #[test]
    fn pooled_mode_copies_the_same_bytes() {
        let src = source(4096);
        let mut dst = vec![0u32; src.len()];
        let engine = SplitCopyEngine::new(src.len(), 4, CopyMode::Pooled).unwrap();
        let result = engine.run(&src, &mut dst, &TrialConfig::new(1, 3)).unwrap();
        assert_eq!(result.samples.len(), 3);
        assert_eq!(src, dst);
    }

    #[test]
    fn single_worker_matches_plain_copy() {
        let src = source(1 << 16);
        let mut split = vec![0u32; src.len()];
        let mut plain = vec![0u32; src.len()];
        parallel_copy(&src, &mut split, 1).unwrap();
        plain.copy_from_slice(&src);
        assert_eq!(split, plain);
    }

    #[test]
    fn run_records_one_sample_per_timed_pass() {
        let src = source(10_000);
        let mut dst = vec![0u32; src.len()];
        let engine = SplitCopyEngine::new(src.len(), 3, CopyMode::ThreadPerPass).unwrap();
        let result = engine.run(&src, &mut dst, &TrialConfig::new(2, 5)).unwrap();
        assert_eq!(result.samples.len(), 5);
        assert_eq!(result.warmup_count, 2);
        assert_eq!(src, dst);
    }

    #[test]
    fn rejects_bad_worker_counts_and_mismatched_buffers() {
        let src = source(8);
        let mut dst = vec![0u32; 8];
        assert!(matches!(
            parallel_copy(&src, &mut dst, 0),
            Err(BenchError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            parallel_copy(&src, &mut dst, 9),
            Err(BenchError::InvalidConfiguration(_))
        ));

        let mut short = vec![0u32; 7];
        assert!(matches!(
            parallel_copy(&src, &mut short, 2),
            Err(BenchError::InvalidConfiguration(_))
        ));
        assert_eq!(dst, vec![0u32; 8]);
    }
}
