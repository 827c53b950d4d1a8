//! Sample and dictionary records delivered by an event source.

use crate::intern::FrameType;
use serde::{Deserialize, Serialize};

/// What a sample observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// CPU execution sample
    #[default]
    Execution,

    /// Allocation sample; `extra` names the allocated class
    Allocation {
        #[serde(default)]
        outside_tlab: bool,
    },

    /// Contended lock; `extra` names the monitor class
    Lock,
}

/// Which family of samples a conversion keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Cpu,
    Alloc,
    Lock,
}

impl EventKind {
    pub fn accepts(self, kind: SampleKind) -> bool {
        matches!(
            (self, kind),
            (EventKind::Cpu, SampleKind::Execution)
                | (EventKind::Alloc, SampleKind::Allocation { .. })
                | (EventKind::Lock, SampleKind::Lock)
        )
    }

    /// Whether samples of this family carry an extra class frame
    pub fn has_class_frame(self) -> bool {
        self != EventKind::Cpu
    }
}

/// One timestamped observation of a call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp in recording ticks
    pub time: u64,

    /// Raw stack trace identifier
    pub stack_id: u64,

    /// Raw class id for allocation/lock samples
    #[serde(default)]
    pub extra: Option<u64>,

    #[serde(default)]
    pub kind: SampleKind,
}

impl Sample {
    pub fn execution(time: u64, stack_id: u64) -> Self {
        Self {
            time,
            stack_id,
            extra: None,
            kind: SampleKind::Execution,
        }
    }
}

/// One frame of a raw stack trace (leaf-first order in the trace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Raw method id, resolved through the methods dictionary
    pub method: u64,

    #[serde(rename = "type")]
    pub frame_type: FrameType,

    #[serde(default)]
    pub location: u32,
}

/// Methods dictionary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Raw class id
    pub class: u64,

    /// Symbol id of the method name
    pub name: u64,
}

/// Classes dictionary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    /// Symbol id of the class name
    pub name: u64,
}

/// Conversion between recording ticks and wall-clock milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingClock {
    #[serde(default)]
    pub start_ticks: u64,

    #[serde(default = "default_ticks_per_sec")]
    pub ticks_per_sec: u64,

    /// Wall-clock time of `start_ticks`, in epoch milliseconds
    #[serde(default)]
    pub start_ms: u64,
}

fn default_ticks_per_sec() -> u64 {
    1000
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self {
            start_ticks: 0,
            ticks_per_sec: default_ticks_per_sec(),
            start_ms: 0,
        }
    }
}

impl RecordingClock {
    /// Milliseconds elapsed since the recording started
    pub fn elapsed_ms(&self, ticks: u64) -> u64 {
        let elapsed = u128::from(ticks.saturating_sub(self.start_ticks)) * 1000;
        let ms = elapsed / u128::from(self.ticks_per_sec.max(1));
        u64::try_from(ms).unwrap_or(u64::MAX)
    }
}
