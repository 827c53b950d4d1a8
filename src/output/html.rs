//! HTML document writer.
//!
//! Renders a payload into a template and writes the result to disk.

use super::template::Template;
use crate::pipeline::Payload;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render `payload` through `template` and write it to `output_path`.
///
/// **Public** - main entry point for HTML output
///
/// # Arguments
/// * `template` - Validated template
/// * `payload` - Encoded sections
/// * `output_path` - Path to output HTML file
///
/// # Errors
/// * `OutputError::Template` - the template refers to a placeholder with no value
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - path cannot be created or is a directory
pub fn write_html(
    template: &Template,
    payload: &Payload,
    output_path: impl AsRef<Path>,
) -> Result<u64, OutputError> {
    let output_path = output_path.as_ref();
    let rendered = template.render(&payload.placeholders())?;

    write_document(&rendered, output_path)?;
    Ok(rendered.len() as u64)
}

/// Write already rendered text to a file, creating parent directories.
pub fn write_document(text: &str, output_path: &Path) -> Result<(), OutputError> {
    info!("Writing document to: {}", output_path.display());

    validate_output_path(output_path)?;
    create_parent_dirs(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes())?;
    writer.flush()?;

    info!("Document written successfully ({} bytes)", text.len());
    Ok(())
}

/// **Private** - shared with the stats writer
pub(super) fn create_parent_dirs(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

/// Validate that output path is writable
///
/// **Private** - internal validation
pub(super) fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}
