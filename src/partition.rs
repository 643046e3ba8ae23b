use std::ops::Range;

use crate::error::{BenchError, Result};

/// Contiguous, disjoint, fully-covering split of `0..len` into one range per worker.
///
/// Workers `0..W-1` each get `len / W` elements; the last worker also absorbs `len % W`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkPartition {
    len: usize,
    ranges: Vec<Range<usize>>,
}

impl WorkPartition {
    pub fn new(len: usize, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(BenchError::invalid("worker_count must be at least 1"));
        }
        if worker_count > len {
            return Err(BenchError::invalid(format!(
                "worker_count {worker_count} exceeds buffer length {len}"
            )));
        }

        let base = len / worker_count;
        let ranges = (0..worker_count)
            .map(|w| {
                let start = w * base;
                let end = if w == worker_count - 1 { len } else { start + base };
                start..end
            })
            .collect();

        Ok(Self { len, ranges })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn worker_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Carve `buf` into one mutable slice per range, in range order.
    ///
    /// `buf.len()` must equal the partitioned length.
    pub fn split_mut<'a, T>(&self, mut buf: &'a mut [T]) -> Vec<&'a mut [T]> {
        debug_assert_eq!(buf.len(), self.len);
        let mut out = Vec::with_capacity(self.ranges.len());
        for r in &self.ranges {
            let (head, tail) = std::mem::take(&mut buf).split_at_mut(r.len());
            out.push(head);
            buf = tail;
        }
        out
    }

    pub fn split<'a, T>(&self, buf: &'a [T]) -> Vec<&'a [T]> {
        debug_assert_eq!(buf.len(), self.len);
        self.ranges.iter().map(|r| &buf[r.clone()]).collect()
    }
}
