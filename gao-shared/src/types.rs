//! Resource specification and Gaolette state.

use serde::{Deserialize, Serialize};

/// Identifier the subprocess assigns to a Gaolette.
pub type GaoletteId = i32;

/// Sentinel id for a Gaolette that has no subprocess-side counterpart.
pub const UNASSIGNED_ID: GaoletteId = -1;

/// Whether a Gaolette's memory region may grow and shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPolicy {
    /// Fixed size, no contraction or expansion.
    #[default]
    Static,
    /// Contraction and expansion allowed within the limits.
    Dynamic,
}

impl MemoryPolicy {
    pub fn code(self) -> u8 {
        match self {
            MemoryPolicy::Static => 0,
            MemoryPolicy::Dynamic => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MemoryPolicy::Static),
            1 => Some(MemoryPolicy::Dynamic),
            _ => None,
        }
    }
}

/// Resource/performance specification attached to a Gaolette at creation.
///
/// The subprocess enforces it; the client keeps its copy as a record of what
/// was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerfSpec {
    /// Total memory delegated to the sandbox, in bytes.
    pub total_bytes: u64,
    pub memory_policy: MemoryPolicy,
    pub max_memory_bytes: u64,
    pub max_cpu_cores: u32,
}

impl PerfSpec {
    pub fn new(total_bytes: u64, memory_policy: MemoryPolicy) -> Self {
        Self {
            total_bytes,
            memory_policy,
            max_memory_bytes: total_bytes,
            max_cpu_cores: 1,
        }
    }

    pub fn with_max_memory_bytes(mut self, max_memory_bytes: u64) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn with_max_cpu_cores(mut self, max_cpu_cores: u32) -> Self {
        self.max_cpu_cores = max_cpu_cores;
        self
    }
}

/// Lifecycle state of a Gaolette, as last reported by the subprocess.
///
/// `ShutDown` and `Illformed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaoletteState {
    /// Open for read/write.
    Operational,
    /// Closed for read/write.
    ShutDown,
    /// Read-only.
    Locked,
    /// Running code; console I/O stays open.
    Operating,
    /// The subprocess reported, or the client could not parse, a usable state.
    Illformed,
}

impl GaoletteState {
    /// Maps a wire state code. Codes outside `0..=4` have no state.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(GaoletteState::Operational),
            1 => Some(GaoletteState::ShutDown),
            2 => Some(GaoletteState::Locked),
            3 => Some(GaoletteState::Operating),
            4 => Some(GaoletteState::Illformed),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            GaoletteState::Operational => 0,
            GaoletteState::ShutDown => 1,
            GaoletteState::Locked => 2,
            GaoletteState::Operating => 3,
            GaoletteState::Illformed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GaoletteState::ShutDown | GaoletteState::Illformed)
    }
}

impl std::fmt::Display for GaoletteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GaoletteState::Operational => "operational",
            GaoletteState::ShutDown => "shut_down",
            GaoletteState::Locked => "locked",
            GaoletteState::Operating => "operating",
            GaoletteState::Illformed => "illformed",
        };
        f.write_str(name)
    }
}
