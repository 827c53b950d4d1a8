//! Conversion observability.
//!
//! The pipeline never prints or keeps global counters. Instead the caller
//! passes a [`ConversionObserver`] that receives counts, phase timings and
//! encoded section sizes.

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Receiver of conversion events
pub trait ConversionObserver {
    /// A named quantity (accumulated if reported more than once)
    fn count(&mut self, name: &'static str, value: u64);

    /// Wall time spent in a pipeline phase
    fn timing(&mut self, phase: &'static str, elapsed: Duration);

    /// Size in bytes of an encoded payload section
    fn section(&mut self, name: &'static str, bytes: usize);
}

/// Run `f` and report how long it took
pub fn timed<T>(
    observer: &mut dyn ConversionObserver,
    phase: &'static str,
    f: impl FnOnce() -> T,
) -> T {
    let start = Instant::now();
    let result = f();
    observer.timing(phase, start.elapsed());
    result
}

/// Observer that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {
    fn count(&mut self, _name: &'static str, _value: u64) {}

    fn timing(&mut self, _phase: &'static str, _elapsed: Duration) {}

    fn section(&mut self, _name: &'static str, _bytes: usize) {}
}

/// Observer that forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ConversionObserver for LogObserver {
    fn count(&mut self, name: &'static str, value: u64) {
        debug!("{}: {}", name, value);
    }

    fn timing(&mut self, phase: &'static str, elapsed: Duration) {
        info!("{} took {:.2}ms", phase, elapsed.as_secs_f64() * 1000.0);
    }

    fn section(&mut self, name: &'static str, bytes: usize) {
        info!("{} section: {}", name, format_size(bytes));
    }
}

/// Snapshot of everything a [`StatsRecorder`] saw
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// ISO 8601 timestamp of when the stats were taken
    pub generated_at: String,

    pub counts: BTreeMap<String, u64>,

    pub timings_ms: BTreeMap<String, f64>,

    pub sections: BTreeMap<String, usize>,
}

/// Observer that keeps every event for later serialization
#[derive(Debug, Default, Clone)]
pub struct StatsRecorder {
    counts: BTreeMap<String, u64>,
    timings_ms: BTreeMap<String, f64>,
    sections: BTreeMap<String, usize>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_count(&self, name: &str) -> Option<u64> {
        self.counts.get(name).copied()
    }

    pub fn get_section(&self, name: &str) -> Option<usize> {
        self.sections.get(name).copied()
    }

    pub fn snapshot(&self) -> ConversionStats {
        ConversionStats {
            generated_at: Utc::now().to_rfc3339(),
            counts: self.counts.clone(),
            timings_ms: self.timings_ms.clone(),
            sections: self.sections.clone(),
        }
    }
}

impl ConversionObserver for StatsRecorder {
    fn count(&mut self, name: &'static str, value: u64) {
        *self.counts.entry(name.to_string()).or_default() += value;
    }

    fn timing(&mut self, phase: &'static str, elapsed: Duration) {
        *self.timings_ms.entry(phase.to_string()).or_default() += elapsed.as_secs_f64() * 1000.0;
    }

    fn section(&mut self, name: &'static str, bytes: usize) {
        *self.sections.entry(name.to_string()).or_default() += bytes;
    }
}

impl<A: ConversionObserver, B: ConversionObserver> ConversionObserver for (A, B) {
    fn count(&mut self, name: &'static str, value: u64) {
        self.0.count(name, value);
        self.1.count(name, value);
    }

    fn timing(&mut self, phase: &'static str, elapsed: Duration) {
        self.0.timing(phase, elapsed);
        self.1.timing(phase, elapsed);
    }

    fn section(&mut self, name: &'static str, bytes: usize) {
        self.0.section(name, bytes);
        self.1.section(name, bytes);
    }
}

/// Human-readable byte size
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{}b", bytes);
    }
    let kb = bytes / 1024;
    if kb < 1024 {
        return format!("{}kb", kb);
    }
    format!("{}mb", kb / 1024)
}
