//! LZ78 dictionary encoding of every referenced canonical stack.
//!
//! Stacks are split into phrases while walking a shared trie: each phrase is
//! the longest known prefix (a reference to a trie node) plus one new method.
//! Nodes that are referenced most often are renumbered into a small
//! "synonym" range so their references take fewer symbols.

use super::writer::PayloadWriter;
use crate::utils::error::EncodeError;
use log::debug;
use rustc_hash::FxHashMap;

const ROOT: u32 = 0;

/// Trie node, identified by its allocation index
#[derive(Debug, Default)]
struct LzNode {
    /// Times this node was emitted as a reference
    hits: u64,
    transitions: FxHashMap<u32, u32>,
}

/// One emitted phrase: a node reference, plus the method extending it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Phrase {
    node: u32,
    method: Option<u32>,
}

/// Sizes of the written dictionary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LzSummary {
    pub stacks: usize,
    pub nodes: usize,
    pub synonyms: usize,
    pub phrases: usize,
}

/// Two-pass LZ78 encoder: collect all stacks, then rank and write.
#[derive(Debug)]
pub struct LzEncoder {
    nodes: Vec<LzNode>,
    stacks: Vec<(usize, Vec<Phrase>)>,
}

impl Default for LzEncoder {
    fn default() -> Self {
        Self {
            nodes: vec![LzNode::default()],
            stacks: Vec::new(),
        }
    }
}

impl LzEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split one root-first stack into phrases, growing the trie.
    pub fn add_stack(&mut self, stack: &[u32]) {
        let mut phrases = Vec::new();
        let mut current = ROOT;
        for &method in stack {
            if let Some(&next) = self.nodes[current as usize].transitions.get(&method) {
                current = next;
                continue;
            }
            let fresh = u32::try_from(self.nodes.len())
                .unwrap_or_else(|_| panic!("LZ trie exceeds u32 nodes"));
            self.nodes.push(LzNode::default());
            let parent = &mut self.nodes[current as usize];
            parent.transitions.insert(method, fresh);
            parent.hits += 1;
            phrases.push(Phrase {
                node: current,
                method: Some(method),
            });
            current = ROOT;
        }
        if current != ROOT {
            self.nodes[current as usize].hits += 1;
            phrases.push(Phrase {
                node: current,
                method: None,
            });
        }
        self.stacks.push((stack.len(), phrases));
    }

    /// Allocation ids of the synonym nodes, most used first.
    ///
    /// Only nodes referenced at least twice qualify; ties keep allocation order.
    fn rank_synonyms(&self, capacity: usize) -> Vec<u32> {
        let mut ranked: Vec<u32> = (0..self.nodes.len() as u32)
            .filter(|&id| self.nodes[id as usize].hits > 1)
            .collect();
        ranked.sort_by(|&a, &b| self.nodes[b as usize].hits.cmp(&self.nodes[a as usize].hits));
        ranked.truncate(capacity);
        ranked
    }

    /// Write the dictionary.
    ///
    /// **Public** - consumes the encoder once every stack is added
    ///
    /// Layout: `varint stackCount`, `varint S`, `S` synonym allocation ids,
    /// then per stack `varint length` and its phrases as `(ref, method)`
    /// pairs with an optional trailing `ref`.
    ///
    /// # Errors
    /// Propagates writer failures.
    pub fn finish(
        self,
        out: &mut PayloadWriter,
        synonym_capacity: usize,
    ) -> Result<LzSummary, EncodeError> {
        let synonyms = self.rank_synonyms(synonym_capacity);

        let mut remap: Vec<u32> = vec![u32::MAX; self.nodes.len()];
        for (rank, &id) in synonyms.iter().enumerate() {
            remap[id as usize] = rank as u32;
        }
        let mut next = synonyms.len() as u32;
        for slot in remap.iter_mut().filter(|slot| **slot == u32::MAX) {
            *slot = next;
            next += 1;
        }

        out.write_var(self.stacks.len())?;
        out.write_var(synonyms.len())?;
        for &id in &synonyms {
            out.write_var(id)?;
        }

        let mut phrase_count = 0;
        for (length, phrases) in &self.stacks {
            out.write_var(*length)?;
            for phrase in phrases {
                out.write_var(remap[phrase.node as usize])?;
                if let Some(method) = phrase.method {
                    out.write_var(method)?;
                }
            }
            phrase_count += phrases.len();
        }

        let summary = LzSummary {
            stacks: self.stacks.len(),
            nodes: self.nodes.len(),
            synonyms: synonyms.len(),
            phrases: phrase_count,
        };
        debug!(
            "LZ dictionary: {} stacks, {} trie nodes, {} synonyms",
            summary.stacks, summary.nodes, summary.synonyms
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::writer::decode::Reader;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn phrases(encoder: &LzEncoder, index: usize) -> Vec<(u32, Option<u32>)> {
        encoder.stacks[index]
            .1
            .iter()
            .map(|phrase| (phrase.node, phrase.method))
            .collect()
    }

    #[test]
    fn test_phrases_extend_known_prefixes() {
        let mut encoder = LzEncoder::new();
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1, 2, 4]);
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1]);

        assert_eq!(phrases(&encoder, 0), vec![(0, Some(1)), (0, Some(2)), (0, Some(3))]);
        assert_eq!(phrases(&encoder, 1), vec![(1, Some(2)), (0, Some(4))]);
        assert_eq!(phrases(&encoder, 2), vec![(4, Some(3))]);
        // ends inside a match
        assert_eq!(phrases(&encoder, 3), vec![(1, None)]);
        assert_eq!(encoder.nodes.len(), 7);
    }

    #[test]
    fn test_synonym_ranking() {
        let mut encoder = LzEncoder::new();
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1, 2, 4]);
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1]);
        // root: 4 hits, node 1: 2 hits, node 4: 1 hit
        assert_eq!(encoder.rank_synonyms(10), vec![0, 1]);
        assert_eq!(encoder.rank_synonyms(1), vec![0]);
        assert!(encoder.rank_synonyms(0).is_empty());
    }

    #[test]
    fn test_finish_layout() {
        let mut encoder = LzEncoder::new();
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1, 2, 4]);
        encoder.add_stack(&[1, 2, 3]);
        encoder.add_stack(&[1]);

        let mut out = PayloadWriter::new();
        let summary = encoder.finish(&mut out, 10).unwrap();
        assert_eq!(
            summary,
            LzSummary {
                stacks: 4,
                nodes: 7,
                synonyms: 2,
                phrases: 7
            }
        );

        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        let mut values = Vec::new();
        while !reader.at_end() {
            values.push(reader.var());
        }
        // synonyms root -> 0, node 1 -> 1; nodes 2..=6 -> 2..=6 unchanged
        #[rustfmt::skip]
        let expected = vec![
            4, 2, 0, 1,
            3, 0, 1, 0, 2, 0, 3,
            3, 1, 2, 0, 4,
            3, 4, 3,
            1, 1,
        ];
        assert_eq!(values, expected);
    }

    #[test]
    fn test_remap_moves_synonyms_first() {
        let mut encoder = LzEncoder::new();
        encoder.add_stack(&[1]);
        encoder.add_stack(&[2]);
        encoder.add_stack(&[2, 5]);
        encoder.add_stack(&[2, 6]);
        encoder.add_stack(&[2]);
        // node 2 (method 2) is referenced three times, the root twice
        assert_eq!(encoder.rank_synonyms(1), vec![2]);
        assert_eq!(encoder.rank_synonyms(8), vec![2, 0]);

        let mut out = PayloadWriter::new();
        encoder.finish(&mut out, 8).unwrap();
        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        let mut values = Vec::new();
        while !reader.at_end() {
            values.push(reader.var());
        }
        // node 2 -> 0, root -> 1, the rest keep allocation order from 2
        #[rustfmt::skip]
        let expected = vec![
            5, 2, 2, 0,
            1, 1, 1,
            1, 1, 2,
            2, 0, 5,
            2, 0, 6,
            1, 0,
        ];
        assert_eq!(values, expected);
    }

    /// Rebuild stacks from a written dictionary.
    fn decode(bytes: &[u8]) -> Vec<Vec<u32>> {
        let mut reader = Reader::new(bytes);
        let count = reader.var() as usize;
        let synonym_count = reader.var() as usize;
        let synonyms: Vec<usize> = (0..synonym_count).map(|_| reader.var() as usize).collect();

        // written id -> allocation id is only known once nodes exist, so
        // keep paths by allocation id and translate references lazily
        let mut paths: Vec<Vec<u32>> = vec![Vec::new()];
        let to_allocation = |written: usize, allocated: usize| -> usize {
            if written < synonym_count {
                return synonyms[written];
            }
            (0..allocated)
                .filter(|id| !synonyms.contains(id))
                .nth(written - synonym_count)
                .unwrap()
        };

        let mut stacks = Vec::new();
        for _ in 0..count {
            let length = reader.var() as usize;
            let mut stack = Vec::new();
            while stack.len() < length {
                let node = to_allocation(reader.var() as usize, paths.len());
                stack.extend_from_slice(&paths[node]);
                if stack.len() < length {
                    let method = reader.var() as u32;
                    let mut path = paths[node].clone();
                    path.push(method);
                    paths.push(path);
                    stack.push(method);
                }
            }
            stacks.push(stack);
        }
        assert!(reader.at_end());
        stacks
    }

    proptest! {
        #[test]
        fn proptest_dictionary_is_lossless(
            stacks in proptest::collection::vec(proptest::collection::vec(1u32..5, 0..8), 0..30),
            capacity in 0usize..6,
        ) {
            let mut encoder = LzEncoder::new();
            for stack in &stacks {
                encoder.add_stack(stack);
            }
            let mut out = PayloadWriter::new();
            encoder.finish(&mut out, capacity).unwrap();
            prop_assert_eq!(decode(out.as_bytes()), stacks);
        }
    }
}
