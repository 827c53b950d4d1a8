use crate::source::{Recording, RecordingSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Validate a recording JSON file and print what it contains
///
/// Dangling references are listed as warnings; they do not fail validation
/// because conversion substitutes sentinel frames for them.
pub fn validate_recording_file(file_path: &Path) -> Result<RecordingSummary> {
    println!("Validating recording: {}", file_path.display());

    let recording = Recording::load(file_path)
        .with_context(|| format!("Failed to load recording {}", file_path.display()))?;
    let summary = recording.validate();

    println!("✓ Valid recording JSON");
    println!("  Samples: {}", summary.samples);
    println!("  Stack Traces: {}", summary.stack_traces);
    println!("  Methods: {}", summary.methods);
    println!("  Classes: {}", summary.classes);
    println!("  Symbols: {}", summary.symbols);

    if !summary.warnings.is_empty() {
        println!("  Warnings: {}", summary.warnings.len());
        for warning in &summary.warnings {
            println!("    - {}", warning);
        }
    }

    Ok(summary)
}

/// Display version information
pub fn display_version() {
    println!("Stack Heatmap v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Converts profiling samples into self-contained heatmap documents.");
}
