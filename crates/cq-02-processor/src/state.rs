//! Processor run state.
//!
//! ```text
//! RUNNING ──stop()──→ STOPPING ──pool drained──→ STOPPED
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Running,
            1 => ProcessorState::Stopping,
            _ => ProcessorState::Stopped,
        }
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessorState::Running => "RUNNING",
            ProcessorState::Stopping => "STOPPING",
            ProcessorState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Lock-free cell holding a [`ProcessorState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ProcessorState::Running as u8))
    }

    pub(crate) fn load(&self) -> ProcessorState {
        ProcessorState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`; false if the current state is not `from`.
    pub(crate) fn transition(&self, from: ProcessorState, to: ProcessorState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn set(&self, state: ProcessorState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}
