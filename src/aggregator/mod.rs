//! Aggregation of canonical samples into time-bucketed call trees.
//!
//! This module transforms samples into:
//! - Canonical, interned stacks (with sentinel fallback)
//! - One call tree per fixed-width time bucket
//! - Coarser resolutions built by destructive merging

pub mod block;
pub mod bucket;
pub mod canonical;
pub mod merge;

// Re-export main types and functions
pub use block::{Block, Children};
pub use bucket::{build_buckets, Bucket};
pub use canonical::{normalize_class_name, StackCanonicalizer};
pub use merge::{merge_buckets, merge_into, Resolution};
