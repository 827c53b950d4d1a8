//! Per-bucket head/tail encoding of aggregation trees.
//!
//! A bucket is written as its root total, the sorted list of its heads (leaf
//! nodes, referenced through their canonical stack) and then the totals of
//! every distinct node on the heads' paths, walked breadth-first by depth.
//! Once a head reaches a node seen by exactly one sample, the rest of its
//! path is implied by the stack table and nothing more is written for it.

use super::writer::PayloadWriter;
use crate::aggregator::{Block, Resolution};
use crate::intern::Interner;
use crate::utils::error::EncodeError;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

/// Canonical stacks referenced by at least one head, with small dense ids
///
/// Shared by all resolution levels so a stack keeps one id across the whole
/// payload.
pub type UsedStacks = Interner<u32>;

/// Nodes already written during one bucket, keyed by `(parent key, method)`
type VisitedNodes = FxHashMap<(usize, u32), usize>;

const ROOT_KEY: usize = 0;

struct Head<'t, 's> {
    stack: &'s [u32],
    node: &'t Block,
    key: usize,
}

impl Head<'_, '_> {
    /// Step one level down. Returns `false` once the head retires.
    fn descend(
        &mut self,
        depth: usize,
        out: &mut PayloadWriter,
        visited: &mut VisitedNodes,
    ) -> Result<bool, EncodeError> {
        let Some(&method) = self.stack.get(depth) else {
            return Ok(false);
        };
        let child = self.node.child(method).unwrap_or_else(|| {
            panic!("stack leaves the tree at depth {depth} (method {method})")
        });

        let fresh_key = visited.len() + 1;
        match visited.entry((self.key, method)) {
            Entry::Occupied(entry) => {
                self.key = *entry.get();
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh_key);
                out.write_var(child.total())?;
                if child.total() == 1 {
                    return Ok(false);
                }
                self.key = fresh_key;
            }
        }
        self.node = child;
        Ok(true)
    }
}

/// Write one bucket tree.
///
/// **Public** - called once per bucket of every resolution level
///
/// # Arguments
/// * `out` - Payload being written
/// * `root` - Root of the bucket's tree
/// * `stack` - Resolves a canonical stack id to its root-first method ids
/// * `used` - Ids of referenced stacks, extended with this bucket's heads
///
/// # Returns
/// Number of heads written
///
/// # Errors
/// Propagates writer failures; the payload is unusable afterwards.
pub fn encode_bucket<'s, F>(
    out: &mut PayloadWriter,
    root: &Block,
    stack: F,
    used: &mut UsedStacks,
) -> Result<usize, EncodeError>
where
    F: Fn(u32) -> &'s [u32],
{
    out.write_var(root.total())?;
    if root.total() == 0 {
        return Ok(0);
    }

    // pass 1: heads sorted by used-stack id, written as gaps
    let mut heads: Vec<(u32, &Block)> = root
        .leaves()
        .into_iter()
        .map(|leaf| (used.index(leaf.stack_id()), leaf))
        .collect();
    heads.sort_unstable_by_key(|&(used_id, _)| used_id);

    out.write_var(heads.len())?;
    let mut previous = 0;
    for &(used_id, _) in &heads {
        debug_assert!(used_id > previous, "two heads share stack {used_id}");
        out.write_var(used_id - previous - 1)?;
        previous = used_id;
    }

    // pass 2: level walk over all heads at once
    let mut active: Vec<Option<Head>> = heads
        .iter()
        .map(|&(_, leaf)| {
            Some(Head {
                stack: stack(leaf.stack_id()),
                node: root,
                key: ROOT_KEY,
            })
        })
        .collect();
    let mut visited = VisitedNodes::default();
    let mut live = active.len();
    let mut depth = 0;

    while live > 0 {
        for slot in active.iter_mut() {
            let Some(head) = slot.as_mut() else {
                continue;
            };
            if !head.descend(depth, out, &mut visited)? {
                *slot = None;
                live -= 1;
            }
        }

        let retired = active.len() - live;
        if retired * 2 >= active.len() {
            active.retain(Option::is_some);
        }
        depth += 1;
    }

    Ok(heads.len())
}

/// Write all buckets of one level, each behind its own length prefix.
///
/// Layout: `[len30][varint batch size][varint bucket count][len30, bucket]*`
///
/// # Returns
/// Number of heads written across the level
pub fn encode_resolution<'s, F>(
    out: &mut PayloadWriter,
    resolution: &Resolution,
    stack: F,
    used: &mut UsedStacks,
) -> Result<usize, EncodeError>
where
    F: Fn(u32) -> &'s [u32],
{
    let level = out.reserve_length();
    out.write_var(resolution.batch_size)?;
    out.write_var(resolution.buckets.len())?;

    let mut heads = 0;
    for bucket in &resolution.buckets {
        let slot = out.reserve_length();
        heads += encode_bucket(out, bucket.root(), &stack, used)?;
        out.patch_length(slot)?;
    }
    out.patch_length(level)?;

    debug!(
        "Encoded {} buckets (batch {}) with {} heads",
        resolution.buckets.len(),
        resolution.batch_size,
        heads
    );
    Ok(heads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Bucket;
    use crate::encoder::writer::decode::Reader;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn encode(stacks: &[Vec<u32>], samples: &[u32], used: &mut UsedStacks) -> Vec<u64> {
        let mut root = Block::root();
        for &id in samples {
            root.add_stack(&stacks[id as usize - 1], id);
        }
        let mut out = PayloadWriter::new();
        encode_bucket(&mut out, &root, |id| stacks[id as usize - 1].as_slice(), used).unwrap();

        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        let mut values = Vec::new();
        while !reader.at_end() {
            values.push(reader.var());
        }
        values
    }

    #[test]
    fn test_shared_prefix_written_once() {
        let stacks = vec![vec![1, 2], vec![1, 3]];
        let mut used = UsedStacks::new();
        used.index(1);
        used.index(2);

        let values = encode(&stacks, &[1, 2, 1], &mut used);
        // root, heads, gaps, then depth 0: node 1, depth 1: node 2, node 3
        assert_eq!(values, vec![3, 2, 0, 0, 3, 2, 1]);
    }

    #[test]
    fn test_unique_path_retires_early() {
        let stacks = vec![vec![5, 6, 7]];
        let values = encode(&stacks, &[1], &mut UsedStacks::new());
        assert_eq!(values, vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_empty_bucket() {
        let mut out = PayloadWriter::new();
        let heads =
            encode_bucket(&mut out, &Block::root(), |_| &[][..], &mut UsedStacks::new()).unwrap();
        assert_eq!(heads, 0);
        assert_eq!(out.as_bytes(), b"?");
    }

    #[test]
    fn test_head_gaps_use_previous_id() {
        let stacks = vec![vec![1], vec![2], vec![3]];
        let mut used = UsedStacks::new();
        for id in 1..=3 {
            used.index(id);
        }

        let values = encode(&stacks, &[3, 1], &mut used);
        // used ids 1 and 3: gaps 0 and 1
        assert_eq!(&values[..4], &[2, 2, 0, 1]);
    }

    #[test]
    fn test_resolution_framing() {
        let stacks = vec![vec![1]];
        let mut buckets = vec![Bucket::new(), Bucket::new()];
        buckets[1].add_stack(&stacks[0], 1);
        let resolution = Resolution::finest(buckets);

        let mut out = PayloadWriter::new();
        let heads = encode_resolution(
            &mut out,
            &resolution,
            |id| stacks[id as usize - 1].as_slice(),
            &mut UsedStacks::new(),
        )
        .unwrap();
        assert_eq!(heads, 1);

        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.fixed30() as usize, bytes.len() - 5);
        assert_eq!(reader.var(), 1);
        assert_eq!(reader.var(), 2);
        assert_eq!(reader.fixed30(), 1);
        assert_eq!(reader.var(), 0);
        assert_eq!(reader.fixed30(), 4);
        assert_eq!([reader.var(), reader.var(), reader.var(), reader.var()], [1, 1, 0, 1]);
        assert!(reader.at_end());
    }

    /// Rebuild the total of every non-root node from an encoded bucket.
    fn decode_totals(
        values: &[u64],
        stacks: &[Vec<u32>],
        used: &UsedStacks,
    ) -> BTreeMap<Vec<u32>, u64> {
        let mut values = values.iter().copied();
        let mut totals = BTreeMap::new();
        if values.next() == Some(0) {
            return totals;
        }

        let count = values.next().unwrap();
        let mut previous = 0;
        let mut active: Vec<Option<&[u32]>> = Vec::new();
        for _ in 0..count {
            previous += values.next().unwrap() as u32 + 1;
            let stack_id = *used.get(previous).unwrap();
            active.push(Some(stacks[stack_id as usize - 1].as_slice()));
        }

        let mut depth = 0;
        while active.iter().any(Option::is_some) {
            for slot in active.iter_mut() {
                let Some(stack) = *slot else { continue };
                if depth >= stack.len() {
                    *slot = None;
                    continue;
                }
                let path = stack[..=depth].to_vec();
                if totals.contains_key(&path) {
                    continue;
                }
                let total = values.next().unwrap();
                totals.insert(path, total);
                if total == 1 {
                    for end in depth + 1..stack.len() {
                        totals.insert(stack[..=end].to_vec(), 1);
                    }
                    *slot = None;
                }
            }
            depth += 1;
        }
        assert_eq!(values.next(), None);
        totals
    }

    fn tree_totals(root: &Block) -> BTreeMap<Vec<u32>, u64> {
        let mut totals = BTreeMap::new();
        let mut pending: Vec<(Vec<u32>, &Block)> = vec![(Vec::new(), root)];
        while let Some((path, node)) = pending.pop() {
            for child in node.children().iter() {
                let mut child_path = path.clone();
                child_path.push(child.method());
                totals.insert(child_path.clone(), child.total());
                pending.push((child_path, child));
            }
        }
        totals
    }

    proptest! {
        #[test]
        fn proptest_bucket_is_lossless(
            stacks in prop::collection::btree_set(prop::collection::vec(1u32..6, 1..6), 1..12),
            picks in prop::collection::vec(0usize..64, 1..80),
        ) {
            let stacks: Vec<Vec<u32>> = stacks.into_iter().collect();
            let mut root = Block::root();
            for pick in picks {
                let id = pick % stacks.len() + 1;
                root.add_stack(&stacks[id - 1], id as u32);
            }

            let mut used = UsedStacks::new();
            let mut out = PayloadWriter::new();
            encode_bucket(
                &mut out,
                &root,
                |id| stacks[id as usize - 1].as_slice(),
                &mut used,
            )
            .unwrap();

            let bytes = out.as_bytes().to_vec();
            let mut reader = Reader::new(&bytes);
            let mut values = Vec::new();
            while !reader.at_end() {
                values.push(reader.var());
            }
            prop_assert_eq!(values[0], root.total());
            prop_assert_eq!(decode_totals(&values, &stacks, &used), tree_totals(&root));
        }
    }
}
