//! Call-tree node with adaptive child storage.
//!
//! Almost every node has zero or one child, while a handful of roots fan out
//! to thousands. Children therefore live in the cheapest representation that
//! fits: nothing, one boxed child, a short vector scanned linearly, or an
//! insertion-ordered map once the vector would exceed
//! [`SMALL_CHILDREN_CAPACITY`].

use crate::intern::FxIndexMap;
use crate::utils::config::SMALL_CHILDREN_CAPACITY;
use std::slice;

/// One node of a bucket's call tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Method id of the edge leading here (0 for the root)
    method: u32,

    /// Samples passing through or ending at this node
    total: u64,

    /// Samples ending exactly here
    self_count: u64,

    /// Canonical stack that most recently reached this node
    stack_id: u32,

    children: Children,
}

impl Block {
    pub fn new(method: u32) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn root() -> Self {
        Self::new(0)
    }

    pub fn method(&self) -> u32 {
        self.method
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn self_count(&self) -> u64 {
        self.self_count
    }

    pub fn stack_id(&self) -> u32 {
        self.stack_id
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Children {
        &mut self.children
    }

    pub fn child(&self, method: u32) -> Option<&Block> {
        self.children.get(method)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Record one sample whose root-first canonical stack is `stack`.
    pub fn add_stack(&mut self, stack: &[u32], stack_id: u32) {
        let mut node = self;
        node.total += 1;
        node.stack_id = stack_id;
        for &method in stack {
            node = node.children.get_or_create(method);
            node.total += 1;
            node.stack_id = stack_id;
        }
        node.self_count += 1;
    }

    /// Fold the counts of `other` into this node, leaving children alone.
    pub(crate) fn absorb_counts(&mut self, other: &Block) {
        self.total += other.total;
        self.self_count += other.self_count;
        if other.stack_id != 0 {
            self.stack_id = other.stack_id;
        }
    }

    pub(crate) fn into_children(self) -> Vec<Block> {
        self.children.into_vec()
    }

    /// Every leaf below (and including) this node, depth-first.
    ///
    /// An untouched root has no leaves.
    pub fn leaves(&self) -> Vec<&Block> {
        let mut leaves = Vec::new();
        if self.total == 0 {
            return leaves;
        }
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if node.is_leaf() {
                leaves.push(node);
            } else {
                pending.extend(node.children.iter());
            }
        }
        leaves
    }

    /// Whether `total == self + Σ child totals` holds for every node below.
    pub fn counts_consistent(&self) -> bool {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            let children_total: u64 = node.children.iter().map(Block::total).sum();
            if node.total != node.self_count + children_total {
                return false;
            }
            pending.extend(node.children.iter());
        }
        true
    }
}

/// Child container of a [`Block`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Children {
    #[default]
    Empty,
    Single(Box<Block>),
    Small(Vec<Block>),
    Many(FxIndexMap<u32, Block>),
}

impl Children {
    pub fn len(&self) -> usize {
        match self {
            Children::Empty => 0,
            Children::Single(_) => 1,
            Children::Small(list) => list.len(),
            Children::Many(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Children::Empty)
    }

    pub fn contains(&self, method: u32) -> bool {
        self.get(method).is_some()
    }

    pub fn get(&self, method: u32) -> Option<&Block> {
        match self {
            Children::Empty => None,
            Children::Single(child) => (child.method == method).then_some(&**child),
            Children::Small(list) => list.iter().find(|child| child.method == method),
            Children::Many(map) => map.get(&method),
        }
    }

    pub fn get_mut(&mut self, method: u32) -> Option<&mut Block> {
        match self {
            Children::Empty => None,
            Children::Single(child) => (child.method == method).then_some(&mut **child),
            Children::Small(list) => list.iter_mut().find(|child| child.method == method),
            Children::Many(map) => map.get_mut(&method),
        }
    }

    /// Child for `method`, created empty if missing.
    pub fn get_or_create(&mut self, method: u32) -> &mut Block {
        if !self.contains(method) {
            return self.insert_new(Block::new(method));
        }
        match self {
            Children::Empty => unreachable!("contains() saw a child in empty storage"),
            Children::Single(child) => &mut **child,
            Children::Small(list) => {
                let index = list
                    .iter()
                    .position(|child| child.method == method)
                    .unwrap_or_else(|| unreachable!("contains() saw child {method}"));
                &mut list[index]
            }
            Children::Many(map) => map.entry(method).or_insert_with(|| Block::new(method)),
        }
    }

    /// Take ownership of `block`; its method must not be present yet.
    pub fn adopt(&mut self, block: Block) {
        debug_assert!(!self.contains(block.method), "duplicate child {}", block.method);
        self.insert_new(block);
    }

    fn insert_new(&mut self, block: Block) -> &mut Block {
        // promote first so the final match only ever appends
        match self {
            Children::Empty => {
                *self = Children::Single(Box::new(block));
                return match self {
                    Children::Single(child) => &mut **child,
                    _ => unreachable!("just stored a single child"),
                };
            }
            Children::Single(_) => {
                let Children::Single(first) = std::mem::take(self) else {
                    unreachable!("matched a single child")
                };
                let mut list = Vec::with_capacity(2);
                list.push(*first);
                *self = Children::Small(list);
            }
            Children::Small(list) if list.len() >= SMALL_CHILDREN_CAPACITY => {
                let map: FxIndexMap<u32, Block> =
                    list.drain(..).map(|child| (child.method, child)).collect();
                *self = Children::Many(map);
            }
            Children::Small(_) | Children::Many(_) => {}
        }

        match self {
            Children::Empty | Children::Single(_) => unreachable!("promotion left no room"),
            Children::Small(list) => {
                // Vec growth doubles the capacity: 2, 4, 8, 16
                list.push(block);
                let last = list.len() - 1;
                &mut list[last]
            }
            Children::Many(map) => map.entry(block.method).or_insert(block),
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        match self {
            Children::Empty => Iter::Empty,
            Children::Single(child) => Iter::Single(Some(&**child)),
            Children::Small(list) => Iter::Small(list.iter()),
            Children::Many(map) => Iter::Many(map.values()),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_> {
        match self {
            Children::Empty => IterMut::Empty,
            Children::Single(child) => IterMut::Single(Some(&mut **child)),
            Children::Small(list) => IterMut::Small(list.iter_mut()),
            Children::Many(map) => IterMut::Many(map.values_mut()),
        }
    }

    pub fn into_vec(self) -> Vec<Block> {
        match self {
            Children::Empty => Vec::new(),
            Children::Single(child) => vec![*child],
            Children::Small(list) => list,
            Children::Many(map) => map.into_values().collect(),
        }
    }
}

/// Borrowing iterator over children in storage order
pub enum Iter<'a> {
    Empty,
    Single(Option<&'a Block>),
    Small(slice::Iter<'a, Block>),
    Many(indexmap::map::Values<'a, u32, Block>),
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Empty => None,
            Iter::Single(child) => child.take(),
            Iter::Small(iter) => iter.next(),
            Iter::Many(iter) => iter.next(),
        }
    }
}

/// Mutable iterator over children in storage order
pub enum IterMut<'a> {
    Empty,
    Single(Option<&'a mut Block>),
    Small(slice::IterMut<'a, Block>),
    Many(indexmap::map::ValuesMut<'a, u32, Block>),
}

impl<'a> Iterator for IterMut<'a> {
    type Item = &'a mut Block;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            IterMut::Empty => None,
            IterMut::Single(child) => child.take(),
            IterMut::Small(iter) => iter.next(),
            IterMut::Many(iter) => iter.next(),
        }
    }
}
