//! Simulation error types.

use std::error::Error;
use std::fmt;

use keel_core::{FrameId, ObjectId};
use keel_heap::HeapError;

// ── ConfigError ─────────────────────────────────────────────────

/// Errors detected during [`ScenarioConfig::validate()`](crate::ScenarioConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Heap configuration is invalid.
    Heap(HeapError),
    /// `max_entities` is zero.
    NoEntityCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heap(e) => write!(f, "heap: {e}"),
            Self::NoEntityCapacity => write!(f, "max_entities must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            Self::NoEntityCapacity => None,
        }
    }
}

impl From<HeapError> for ConfigError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

// ── SimError ────────────────────────────────────────────────────

/// Errors from scenario stepping, spawning and snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// A heap operation failed.
    Heap(HeapError),
    /// Scenario configuration is invalid.
    Config(ConfigError),
    /// The frame index cannot advance past its maximum.
    ClockOverflow {
        /// The frame that could not be advanced.
        frame: FrameId,
    },
    /// A previous step failed part-way; the heap may be inconsistent.
    ///
    /// Cleared only by a successful `restore`.
    Corrupted {
        /// The frame whose step failed.
        frame: FrameId,
    },
    /// No live entity has this id.
    UnknownEntity {
        /// The requested id.
        id: ObjectId,
    },
    /// Spawning would exceed `max_entities`.
    EntityLimit {
        /// The configured limit.
        limit: usize,
    },
    /// A background worker thread could not be started.
    WorkerSpawnFailed {
        /// The OS error message.
        reason: String,
    },
    /// A background worker exited without delivering its result.
    WorkerDisconnected,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heap(e) => write!(f, "heap: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::ClockOverflow { frame } => write!(f, "frame clock overflow at frame {frame}"),
            Self::Corrupted { frame } => {
                write!(f, "scenario corrupted by failed step at frame {frame}; restore a snapshot")
            }
            Self::UnknownEntity { id } => write!(f, "unknown entity {id}"),
            Self::EntityLimit { limit } => write!(f, "entity limit {limit} reached"),
            Self::WorkerSpawnFailed { reason } => write!(f, "worker spawn failed: {reason}"),
            Self::WorkerDisconnected => write!(f, "worker exited without a result"),
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for SimError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
