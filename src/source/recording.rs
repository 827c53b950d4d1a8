//! In-memory recording loaded from a JSON document.
//!
//! Format (stack frames are leaf-first):
//! ```json
//! {
//!   "clock": { "start_ticks": 0, "ticks_per_sec": 1000, "start_ms": 0 },
//!   "samples": [ { "time": 10, "stack_id": 1 } ],
//!   "stack_traces": { "1": [ { "method": 7, "type": "jit", "location": 12 } ] },
//!   "methods": { "7": { "class": 3, "name": 4 } },
//!   "classes": { "3": { "name": 5 } },
//!   "symbols": { "4": "main", "5": "com/example/App" }
//! }
//! ```

use super::schema::{ClassRef, MethodRef, RawFrame, RecordingClock, Sample};
use super::EventSource;
use crate::utils::error::SourceError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A fully materialized event source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub clock: RecordingClock,

    #[serde(default)]
    pub samples: Vec<Sample>,

    #[serde(default)]
    pub stack_traces: HashMap<u64, Vec<RawFrame>>,

    #[serde(default)]
    pub methods: HashMap<u64, MethodRef>,

    #[serde(default)]
    pub classes: HashMap<u64, ClassRef>,

    #[serde(default)]
    pub symbols: HashMap<u64, String>,
}

/// Counts and dangling references found by [`Recording::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSummary {
    pub samples: usize,
    pub stack_traces: usize,
    pub methods: usize,
    pub classes: usize,
    pub symbols: usize,

    /// Human-readable descriptions of unresolvable references
    pub warnings: Vec<String>,
}

impl Recording {
    pub fn new(clock: RecordingClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Load a recording from a JSON file
    ///
    /// **Public** - main entry point for reading input
    ///
    /// # Errors
    /// * `SourceError::Io` - file cannot be opened
    /// * `SourceError::Json` - malformed document
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        info!("Reading recording from: {}", path.display());

        let file = File::open(path)?;
        let recording: Recording = serde_json::from_reader(BufReader::new(file))?;

        debug!(
            "Loaded {} samples, {} stack traces, {} methods, {} classes, {} symbols",
            recording.samples.len(),
            recording.stack_traces.len(),
            recording.methods.len(),
            recording.classes.len(),
            recording.symbols.len()
        );
        Ok(recording)
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn add_symbol(&mut self, id: u64, name: impl Into<String>) -> &mut Self {
        self.symbols.insert(id, name.into());
        self
    }

    pub fn add_class(&mut self, id: u64, name: u64) -> &mut Self {
        self.classes.insert(id, ClassRef { name });
        self
    }

    pub fn add_method(&mut self, id: u64, class: u64, name: u64) -> &mut Self {
        self.methods.insert(id, MethodRef { class, name });
        self
    }

    pub fn add_stack(&mut self, id: u64, frames: Vec<RawFrame>) -> &mut Self {
        self.stack_traces.insert(id, frames);
        self
    }

    pub fn add_sample(&mut self, sample: Sample) -> &mut Self {
        self.samples.push(sample);
        self
    }

    /// Check every reference; dangling ones are reported, never rejected,
    /// since the converter substitutes sentinel frames for them.
    pub fn validate(&self) -> RecordingSummary {
        let mut warnings = Vec::new();

        let mut missing_stacks: Vec<u64> = self
            .samples
            .iter()
            .map(|s| s.stack_id)
            .filter(|id| !self.stack_traces.contains_key(id))
            .collect();
        missing_stacks.sort_unstable();
        missing_stacks.dedup();
        for id in missing_stacks {
            warnings.push(format!("sample references unknown stack trace {id}"));
        }

        let mut stack_ids: Vec<_> = self.stack_traces.keys().copied().collect();
        stack_ids.sort_unstable();
        for stack_id in stack_ids {
            for frame in &self.stack_traces[&stack_id] {
                if !self.methods.contains_key(&frame.method) {
                    warnings.push(format!(
                        "stack trace {stack_id} references unknown method {}",
                        frame.method
                    ));
                }
            }
        }

        let mut method_ids: Vec<_> = self.methods.keys().copied().collect();
        method_ids.sort_unstable();
        for method_id in method_ids {
            let method = &self.methods[&method_id];
            if !self.classes.contains_key(&method.class) {
                warnings.push(format!(
                    "method {method_id} references unknown class {}",
                    method.class
                ));
            }
            if !self.symbols.contains_key(&method.name) {
                warnings.push(format!(
                    "method {method_id} references unknown symbol {}",
                    method.name
                ));
            }
        }

        let mut class_ids: Vec<_> = self.classes.keys().copied().collect();
        class_ids.sort_unstable();
        for class_id in class_ids {
            let name = self.classes[&class_id].name;
            if !self.symbols.contains_key(&name) {
                warnings.push(format!("class {class_id} references unknown symbol {name}"));
            }
        }

        RecordingSummary {
            samples: self.samples.len(),
            stack_traces: self.stack_traces.len(),
            methods: self.methods.len(),
            classes: self.classes.len(),
            symbols: self.symbols.len(),
            warnings,
        }
    }
}

impl EventSource for Recording {
    fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn clock(&self) -> RecordingClock {
        self.clock
    }

    fn stack_trace(&self, id: u64) -> Option<&[RawFrame]> {
        self.stack_traces.get(&id).map(Vec::as_slice)
    }

    fn method(&self, id: u64) -> Option<&MethodRef> {
        self.methods.get(&id)
    }

    fn class(&self, id: u64) -> Option<&ClassRef> {
        self.classes.get(&id)
    }

    fn symbol(&self, id: u64) -> Option<&[u8]> {
        self.symbols.get(&id).map(String::as_bytes)
    }
}
