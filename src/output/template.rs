//! Visualization template with `${name}` placeholders.
//!
//! Templates are checked for every required placeholder when they are
//! loaded, so a broken template fails the conversion before any samples are
//! aggregated.

use crate::utils::config::REQUIRED_PLACEHOLDERS;
use crate::utils::error::TemplateError;
use log::{debug, info};
use std::path::Path;

const BUILTIN: &str = include_str!("heatmap.html");

const OPEN: &str = "${";
const CLOSE: char = '}';

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// A validated template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    /// Template compiled into the binary
    pub fn builtin() -> Self {
        Self {
            text: BUILTIN.to_string(),
        }
    }

    /// Read and validate a template file.
    ///
    /// **Public** - called before any aggregation work
    ///
    /// # Errors
    /// * `TemplateError::Missing` - file cannot be read
    /// * `TemplateError::MissingPlaceholder` - a required placeholder is absent
    /// * `TemplateError::Unterminated` - a `${` has no closing brace
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        info!("Loading template from: {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Missing {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(text)
    }

    /// Validate template text.
    pub fn parse(text: impl Into<String>) -> Result<Self, TemplateError> {
        let template = Self { text: text.into() };
        let names = template.placeholders()?;
        for &required in REQUIRED_PLACEHOLDERS {
            if !names.contains(&required) {
                return Err(TemplateError::MissingPlaceholder(required.to_string()));
            }
        }
        debug!("Template has {} placeholders", names.len());
        Ok(template)
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> Result<Vec<&str>, TemplateError> {
        Ok(self
            .segments()?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name),
                Segment::Text(_) => None,
            })
            .collect())
    }

    /// Substitute every placeholder.
    ///
    /// # Errors
    /// * `TemplateError::UnknownPlaceholder` - no value was given for a name
    pub fn render<S: AsRef<str>>(&self, values: &[(&str, S)]) -> Result<String, TemplateError> {
        let segments = self.segments()?;
        let extra: usize = values.iter().map(|(_, value)| value.as_ref().len()).sum();
        let mut rendered = String::with_capacity(self.text.len() + extra);

        for segment in segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let (_, value) = values
                        .iter()
                        .find(|(key, _)| *key == name)
                        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
                    rendered.push_str(value.as_ref());
                }
            }
        }
        Ok(rendered)
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = self.text.as_str();
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or(TemplateError::Unterminated(offset + start))?;
            segments.push(Segment::Text(&rest[..start]));
            segments.push(Segment::Placeholder(&after[..end]));

            let consumed = start + OPEN.len() + end + 1;
            rest = &rest[consumed..];
            offset += consumed;
        }
        segments.push(Segment::Text(rest));
        Ok(segments)
    }
}
