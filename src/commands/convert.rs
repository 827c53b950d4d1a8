//! Convert command implementation.
//!
//! The convert command:
//! 1. Loads and checks the visualization template
//! 2. Loads the recording
//! 3. Aggregates and encodes the samples
//! 4. Renders and writes the HTML document
//! 5. Writes conversion statistics (if requested)

use crate::metrics::{LogObserver, StatsRecorder};
use crate::output::{write_html, write_stats, Template};
use crate::pipeline::{Converter, ConverterConfig};
use crate::source::{EventKind, Recording};
use crate::utils::config::{DEFAULT_BUCKET_MS, DEFAULT_TITLE};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Longest accepted bucket width: one hour
const MAX_BUCKET_MS: u64 = 60 * 60 * 1000;

/// Arguments for the convert command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ConvertArgs {
    /// Recording JSON to read
    pub input: PathBuf,

    /// HTML document to write
    pub output: PathBuf,

    /// Document title
    pub title: String,

    /// Which samples to convert
    pub event_kind: EventKind,

    /// Width of a finest-level bucket in milliseconds
    pub bucket_ms: u64,

    /// Custom template (built-in template if None)
    pub template: Option<PathBuf>,

    /// Where to write conversion statistics (optional)
    pub stats: Option<PathBuf>,
}

impl Default for ConvertArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("recording.json"),
            output: PathBuf::from("heatmap.html"),
            title: DEFAULT_TITLE.to_string(),
            event_kind: EventKind::Cpu,
            bucket_ms: DEFAULT_BUCKET_MS,
            template: None,
            stats: None,
        }
    }
}

/// Execute the convert command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Convert command arguments
///
/// # Returns
/// Size of the written document in bytes
///
/// # Errors
/// * Template missing or incomplete (checked before any other work)
/// * Recording unreadable or malformed
/// * Encoding overflow, or samples spanning too many buckets
/// * File write errors
pub fn execute_convert(args: ConvertArgs) -> Result<u64> {
    let start_time = Instant::now();

    info!("Converting {} ({:?} samples)", args.input.display(), args.event_kind);

    // Step 1: Template first, so a broken one fails fast
    info!("Step 1/5: Loading template...");
    let template = match &args.template {
        Some(path) => Template::load(path)
            .with_context(|| format!("Failed to load template {}", path.display()))?,
        None => Template::builtin(),
    };

    // Step 2: Load recording
    info!("Step 2/5: Loading recording...");
    let recording = Recording::load(&args.input)
        .with_context(|| format!("Failed to load recording {}", args.input.display()))?;

    debug!(
        "Recording: {} samples, {} stack traces",
        recording.samples.len(),
        recording.stack_traces.len()
    );

    // Step 3: Aggregate and encode
    info!("Step 3/5: Aggregating and encoding samples...");
    let config = ConverterConfig::new()
        .with_title(args.title.clone())
        .with_event_kind(args.event_kind)
        .with_bucket_ms(args.bucket_ms);
    let mut observer = (LogObserver, StatsRecorder::new());
    let payload = Converter::new(config)
        .convert(&recording, &mut observer)
        .context("Failed to encode heatmap")?;

    // Step 4: Write document
    info!("Step 4/5: Writing document...");
    let written = write_html(&template, &payload, &args.output)
        .context("Failed to write heatmap document")?;

    info!("✓ Heatmap written to: {}", args.output.display());

    // Step 5: Write stats (if requested)
    if let Some(stats_path) = &args.stats {
        info!("Step 5/5: Writing conversion stats...");
        write_stats(&observer.1.snapshot(), stats_path)
            .context("Failed to write conversion stats")?;

        info!("✓ Stats written to: {}", stats_path.display());
    } else {
        info!("Step 5/5: Skipping stats (not requested)");
    }

    let elapsed = start_time.elapsed();
    info!("Conversion completed in {:.2}s", elapsed.as_secs_f64());

    Ok(written)
}

/// Validate convert arguments
///
/// **Public** - called before execute_convert for early validation
///
/// # Arguments
/// * `args` - Arguments to validate
///
/// # Returns
/// Ok if arguments are valid, Err with message if not
pub fn validate_args(args: &ConvertArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if args.output.as_os_str().is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }

    if args.input == args.output {
        anyhow::bail!("Output would overwrite the input recording");
    }

    if args.bucket_ms == 0 {
        anyhow::bail!("bucket_ms must be greater than 0");
    }

    if args.bucket_ms > MAX_BUCKET_MS {
        anyhow::bail!("bucket_ms is too large (max {})", MAX_BUCKET_MS);
    }

    if args.title.trim().is_empty() {
        anyhow::bail!("Title cannot be empty");
    }

    Ok(())
}
