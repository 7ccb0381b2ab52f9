use std::{num::NonZeroUsize, ops::Range};

/// A contiguous slice of indices owned by a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRange {
    start: usize,
    end: usize,
}

impl WorkRange {
    /// Creates a new `WorkRange`.
    ///
    /// # Arguments
    /// * `start` - The first owned index.
    /// * `end` - One past the last owned index, must not be smaller than `start`.
    ///
    /// # Returns
    /// A new `WorkRange` instance.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "work range ends before it starts");
        Self { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the range as a std `Range`, ready to index slices.
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Splits `[0, total)` into one contiguous range per worker.
///
/// Every range has `ceil(total / workers)` elements except the last one, which ends exactly
/// at `total`. When there are more workers than chunks the trailing ranges are empty.
///
/// # Arguments
/// * `total` - The length of the vector to split.
/// * `workers` - The amount of workers.
///
/// # Returns
/// The ranges, indexed by rank.
pub fn partition(total: usize, workers: NonZeroUsize) -> Vec<WorkRange> {
    let workers = workers.get();
    let chunk = total.div_ceil(workers);

    (0..workers)
        .map(|rank| {
            let start = (rank * chunk).min(total);
            let end = if rank + 1 == workers {
                total
            } else {
                ((rank + 1) * chunk).min(total)
            };

            WorkRange::new(start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn partition_uses_ceiling_division() {
        let ranges = partition(10, workers(3));
        let ranges: Vec<_> = ranges.iter().map(WorkRange::as_range).collect();
        assert_eq!(ranges, [0..4, 4..8, 8..10]);
    }

    #[test]
    fn partition_with_more_workers_than_elements() {
        let ranges = partition(5, workers(4));
        let ranges: Vec<_> = ranges.iter().map(WorkRange::as_range).collect();
        assert_eq!(ranges, [0..2, 2..4, 4..5, 5..5]);
    }

    #[test]
    fn partition_of_empty_vector() {
        let ranges = partition(0, workers(3));
        assert!(ranges.iter().all(WorkRange::is_empty));
    }

    #[test]
    fn partition_covers_every_index_exactly_once() {
        for total in 0..64 {
            for w in 1..=9 {
                let ranges = partition(total, workers(w));
                assert_eq!(ranges.len(), w);

                let mut hits = vec![0; total];
                let mut cursor = 0;

                for range in &ranges {
                    assert_eq!(range.start(), cursor, "gap or overlap at N={total} W={w}");
                    cursor = range.end();
                    range.as_range().for_each(|i| hits[i] += 1);
                }

                assert_eq!(cursor, total);
                assert!(hits.iter().all(|&h| h == 1), "N={total} W={w}");
            }
        }
    }
}
