//! Method identity as written to the method table.

use serde::{Deserialize, Serialize};

/// Kind of code a frame was executing.
///
/// The discriminants are the values stored in the low 4 bits of the method
/// table's second word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Interpreted = 0,
    Jit = 1,
    Inlined = 2,
    Native = 3,
    Cpp = 4,
    Kernel = 5,
}

impl FrameType {
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// An interned method: every field takes part in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    /// Symbol id of the declaring class name
    pub class_name: u32,

    /// Symbol id of the method name
    pub method_name: u32,

    /// Packed line number / bytecode offset
    pub location: u32,

    pub frame_type: FrameType,
}

impl Method {
    pub fn new(class_name: u32, method_name: u32, location: u32, frame_type: FrameType) -> Self {
        Self {
            class_name,
            method_name,
            location,
            frame_type,
        }
    }
}
