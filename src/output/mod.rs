//! Output writers for rendered documents and conversion statistics.
//!
//! This module handles:
//! - Visualization templates with `${name}` placeholders
//! - Writing the rendered HTML document
//! - JSON conversion statistics

pub mod html;
pub mod stats;
pub mod template;

// Re-export main functions
pub use html::{write_document, write_html};
pub use stats::write_stats;
pub use template::Template;
