//! Destructive merging of buckets into coarser time resolutions.
//!
//! The first bucket of every group becomes the accumulator; all later trees
//! of the group are moved into it. Subtrees the accumulator lacks are adopted
//! whole, so merging costs only as much as the overlap between trees.

use super::block::Block;
use super::bucket::Bucket;
use crate::intern::FxIndexMap;
use log::debug;

/// Buckets of one zoom level
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// How many buckets of the level below form one bucket here (1 for level 0)
    pub batch_size: usize,

    pub buckets: Vec<Bucket>,
}

impl Resolution {
    pub fn finest(buckets: Vec<Bucket>) -> Self {
        Self {
            batch_size: 1,
            buckets,
        }
    }

    /// Consume this level and produce the next coarser one.
    pub fn coarsen(self, batch_size: usize) -> Resolution {
        Resolution {
            batch_size,
            buckets: merge_buckets(self.buckets, batch_size),
        }
    }
}

/// Merge every `batch_size` adjacent buckets into one.
///
/// # Panics
/// Panics if `batch_size` is zero.
pub fn merge_buckets(buckets: Vec<Bucket>, batch_size: usize) -> Vec<Bucket> {
    assert!(batch_size > 0, "batch size must be positive");
    debug!(
        "Merging {} buckets in batches of {}",
        buckets.len(),
        batch_size
    );

    let mut merged = Vec::with_capacity(buckets.len().div_ceil(batch_size));
    let mut buckets = buckets.into_iter();
    loop {
        let mut group = buckets.by_ref().take(batch_size);
        let Some(mut accumulator) = group.next() else {
            break;
        };
        for bucket in group {
            merge_into(accumulator.root_mut(), bucket.into_root());
        }
        merged.push(accumulator);
    }
    merged
}

/// Move every sample of `source` into `target`.
pub fn merge_into(target: &mut Block, source: Block) {
    let mut work: Vec<(&mut Block, Block)> = vec![(target, source)];

    while let Some((target, source)) = work.pop() {
        target.absorb_counts(&source);

        let mut matched: FxIndexMap<u32, Block> = FxIndexMap::default();
        for child in source.into_children() {
            if target.children().contains(child.method()) {
                matched.insert(child.method(), child);
            } else {
                target.children_mut().adopt(child);
            }
        }
        if matched.is_empty() {
            continue;
        }

        for target_child in target.children_mut().iter_mut() {
            if let Some(source_child) = matched.swap_remove(&target_child.method()) {
                work.push((target_child, source_child));
            }
        }
        debug_assert!(matched.is_empty(), "matched children vanished");
    }
}
