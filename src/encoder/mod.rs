//! Payload encoding: printable writer, per-bucket trees, global stack
//! dictionary and the method/symbol tables.

pub mod head_tail;
pub mod lz;
pub mod tables;
pub mod writer;

pub use head_tail::{encode_bucket, encode_resolution, UsedStacks};
pub use lz::{LzEncoder, LzSummary};
pub use tables::{constant_pool, encode_methods};
pub use writer::{pack_fields, LengthSlot, PayloadWriter};
