//! Stack Heatmap
//!
//! Converts profiling samples (timestamped call stacks) into a compact,
//! printable payload embedded in a self-contained HTML heatmap.
//!
//! The core pipeline:
//! - [`intern`]: dense ids for symbols, methods and stacks
//! - [`aggregator`]: canonical stacks, per-bucket call trees and their
//!   destructive merge into coarser time resolutions
//! - [`encoder`]: head/tail bucket encoding, the LZ stack dictionary and the
//!   bit-packed writer
//! - [`pipeline`]: the [`Converter`](pipeline::Converter) tying it together
//!
//! ## Getting Started
//!
//! ```bash
//! stack-heatmap convert -i recording.json -o heatmap.html
//! stack-heatmap --help
//! ```

pub mod aggregator;
pub mod commands;
pub mod encoder;
pub mod intern;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod utils;
