//! Configuration and constants for the converter.

/// Default width of one finest-resolution time bucket
pub const DEFAULT_BUCKET_MS: u64 = 20;

/// Upper bound on finest-level buckets of one conversion
// 2^22 buckets of 20ms cover a little over 23 hours
pub const MAX_BUCKETS: usize = 1 << 22;

/// Batch sizes used to derive resolution levels 1..=3 from the level below.
// With 20ms buckets: 50 -> 1s, 60 -> 1min, 60 -> 1h
pub const DEFAULT_RESOLUTION_BATCHES: [usize; 3] = [50, 60, 60];

/// Children kept in a linearly scanned vector before promotion to a map
pub const SMALL_CHILDREN_CAPACITY: usize = 16;

/// Number of LZ trie nodes that may be remapped to the cheapest ids
// Three 5-bit varint chunks
pub const DEFAULT_SYNONYM_CAPACITY: usize = 32 * 32 * 32;

/// Width of each sub-field packed into a 36-bit method table word
pub const METHOD_FIELD_BITS: u32 = 18;

// Sentinel names substituted for unresolvable dictionary references
pub const UNKNOWN_METHOD_NAME: &str = "<UnknownMethod>";
pub const UNKNOWN_CLASS_NAME: &str = "<UnknownClass>";

/// Placeholders every visualization template has to provide
pub const REQUIRED_PLACEHOLDERS: &[&str] = &[
    "title",
    "startMs",
    "ticksPerSecond",
    "heatmap",
    "globalStacks",
    "methods",
    "cpool",
];

/// Default title shown in the rendered document
pub const DEFAULT_TITLE: &str = "Heatmap";
