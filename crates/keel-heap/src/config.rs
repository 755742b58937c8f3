//! Heap configuration parameters.

use crate::error::HeapError;

/// Configuration for a [`SimHeap`](crate::SimHeap).
///
/// Limits guard against runaway registration and against hostile or
/// corrupt snapshots that declare absurd sizes. All values are immutable
/// after the heap is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Maximum number of live allocation records.
    ///
    /// Default: 1_048_576.
    pub max_records: usize,

    /// Maximum element count of a single array field.
    ///
    /// Default: 65_536.
    pub max_array_len: u32,

    /// Maximum byte length of a field name.
    ///
    /// Default: 64. Must be at least 1.
    pub max_name_len: usize,
}

impl HeapConfig {
    /// Default maximum record count.
    pub const DEFAULT_MAX_RECORDS: usize = 1 << 20;

    /// Default maximum array length.
    pub const DEFAULT_MAX_ARRAY_LEN: u32 = 1 << 16;

    /// Default maximum name length in bytes.
    pub const DEFAULT_MAX_NAME_LEN: usize = 64;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.max_records == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "max_records must be at least 1".into(),
            });
        }
        if self.max_name_len == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "max_name_len must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_records: Self::DEFAULT_MAX_RECORDS,
            max_array_len: Self::DEFAULT_MAX_ARRAY_LEN,
            max_name_len: Self::DEFAULT_MAX_NAME_LEN,
        }
    }
}
