//! Fixed-width time buckets, each owning one call tree.

use super::block::Block;
use crate::utils::error::ConvertError;

/// All samples of one time window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    root: Block,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Block {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Block {
        &mut self.root
    }

    pub fn into_root(self) -> Block {
        self.root
    }

    /// Number of samples in this bucket
    pub fn total(&self) -> u64 {
        self.root.total()
    }

    pub fn is_empty(&self) -> bool {
        self.root.total() == 0
    }

    pub fn add_stack(&mut self, stack: &[u32], stack_id: u32) {
        self.root.add_stack(stack, stack_id);
    }
}

/// Group canonical samples into buckets of `bucket_ms` milliseconds.
///
/// `samples` yields `(elapsed_ms, stack_id)` in non-decreasing time order;
/// `stack` resolves a canonical stack id to its root-first method ids.
/// Buckets with no samples in between are kept, empty.
///
/// # Errors
/// * `ConvertError::TooManyBuckets` - a sample lies at or past bucket `limit`
pub fn build_buckets<'s, I, F>(
    samples: I,
    bucket_ms: u64,
    limit: usize,
    stack: F,
) -> Result<Vec<Bucket>, ConvertError>
where
    I: IntoIterator<Item = (u64, u32)>,
    F: Fn(u32) -> &'s [u32],
{
    let bucket_ms = bucket_ms.max(1);
    let mut buckets: Vec<Bucket> = Vec::new();
    for (elapsed_ms, stack_id) in samples {
        let index = elapsed_ms / bucket_ms;
        let slot = usize::try_from(index)
            .ok()
            .filter(|&slot| slot < limit)
            .ok_or(ConvertError::TooManyBuckets { index, limit })?;
        debug_assert!(slot + 1 >= buckets.len(), "samples out of order");
        if slot >= buckets.len() {
            buckets.resize_with(slot + 1, Bucket::default);
        }
        buckets[slot].add_stack(stack(stack_id), stack_id);
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_only(_: u32) -> &'static [u32] {
        &[1]
    }

    #[test]
    fn test_samples_split_by_bucket_width() {
        let stacks: Vec<Vec<u32>> = vec![vec![1]];
        let samples = [(0, 1), (10, 1), (25, 1)];
        let buckets =
            build_buckets(samples, 20, 16, |id| stacks[id as usize - 1].as_slice()).unwrap();

        assert_eq!(buckets.len(), 2);
        let first = buckets[0].root().child(1).unwrap();
        assert_eq!((first.self_count(), first.total()), (2, 2));
        let second = buckets[1].root().child(1).unwrap();
        assert_eq!((second.self_count(), second.total()), (1, 1));
    }

    #[test]
    fn test_gaps_become_empty_buckets() {
        let stacks: Vec<Vec<u32>> = vec![vec![1, 2]];
        let buckets =
            build_buckets([(5, 1), (65, 1)], 20, 16, |id| stacks[id as usize - 1].as_slice())
                .unwrap();

        assert_eq!(buckets.len(), 4);
        assert!(buckets[1].is_empty());
        assert!(buckets[2].is_empty());
        assert_eq!(buckets[3].total(), 1);
    }

    #[test]
    fn test_no_samples_no_buckets() {
        let buckets = build_buckets(std::iter::empty(), 20, 16, |_| &[][..]).unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_bucket_limit_is_exclusive() {
        let buckets = build_buckets([(0, 1), (79, 1)], 20, 4, main_only).unwrap();
        assert_eq!(buckets.len(), 4);

        let err = build_buckets([(0, 1), (80, 1)], 20, 4, main_only).unwrap_err();
        assert!(matches!(err, ConvertError::TooManyBuckets { index: 4, limit: 4 }));
    }

    #[test]
    fn test_outlier_timestamp_is_rejected() {
        let err = build_buckets([(0, 1), (u64::MAX, 1)], 1, usize::MAX, main_only).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::TooManyBuckets {
                index: u64::MAX,
                ..
            }
        ));
    }
}
