//! Heap error types.

use std::error::Error;
use std::fmt;

use keel_core::{FieldType, ObjectId, ValueType};

/// Errors that can occur during heap operations.
///
/// Every variant is recoverable by the caller in tooling and tests. Inside
/// a running scenario any of them aborts the current step and marks the
/// scenario corrupted; the heap never attempts partial recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The owner already has a field with this name.
    DuplicateField {
        /// The owning object.
        owner: ObjectId,
        /// The colliding field name.
        name: String,
    },
    /// A field was registered after the owner finished construction.
    LateRegistration {
        /// The owning object.
        owner: ObjectId,
        /// The field that was being registered.
        name: String,
    },
    /// The handle's record was released, or the handle was issued by a
    /// different heap instance.
    InvalidHandle {
        /// What was wrong with the handle.
        detail: String,
    },
    /// A value of the wrong type was written to a field.
    TypeMismatch {
        /// Field name.
        name: String,
        /// The field's element type.
        expected: ValueType,
        /// The type of the rejected value.
        found: ValueType,
    },
    /// A scalar operation was used on an array field, or vice versa.
    ShapeMismatch {
        /// Field name.
        name: String,
        /// The field's actual type.
        field_type: FieldType,
    },
    /// Array element access past the end of the array.
    IndexOutOfBounds {
        /// Field name.
        name: String,
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },
    /// A record in a snapshot does not match the heap's schema.
    ///
    /// `expected` is `None` when the snapshot contains a field the heap does
    /// not have; `found` is `None` when the heap has a field the snapshot
    /// lacks.
    SchemaMismatch {
        /// The owning object.
        owner: ObjectId,
        /// Field name.
        name: String,
        /// The type registered in the heap.
        expected: Option<FieldType>,
        /// The type recorded in the snapshot.
        found: Option<FieldType>,
    },
    /// Snapshot bytes are truncated or malformed.
    CorruptData {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A configured heap limit would be exceeded.
    CapacityExceeded {
        /// Which limit.
        what: &'static str,
        /// The requested amount.
        requested: usize,
        /// The configured limit.
        capacity: usize,
    },
    /// A field name is empty or longer than the configured maximum.
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// The object is not registered in this heap.
    UnknownObject {
        /// The object id.
        owner: ObjectId,
    },
    /// A [`HeapConfig`](crate::HeapConfig) invariant was violated.
    InvalidConfig {
        /// Description of the violation.
        reason: String,
    },
}

fn fmt_opt_type(t: &Option<FieldType>) -> String {
    match t {
        Some(t) => t.to_string(),
        None => "absent".to_string(),
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateField { owner, name } => {
                write!(f, "object {owner} already has a field named '{name}'")
            }
            Self::LateRegistration { owner, name } => {
                write!(
                    f,
                    "field '{name}' registered on {owner} after construction finished"
                )
            }
            Self::InvalidHandle { detail } => write!(f, "invalid handle: {detail}"),
            Self::TypeMismatch {
                name,
                expected,
                found,
            } => {
                write!(f, "field '{name}' holds {expected}, got {found}")
            }
            Self::ShapeMismatch { name, field_type } => {
                write!(f, "field '{name}' has type {field_type}")
            }
            Self::IndexOutOfBounds { name, index, len } => {
                write!(f, "index {index} out of bounds for '{name}' (len {len})")
            }
            Self::SchemaMismatch {
                owner,
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "schema mismatch for {owner}.{name}: heap has {}, snapshot has {}",
                    fmt_opt_type(expected),
                    fmt_opt_type(found)
                )
            }
            Self::CorruptData { detail } => write!(f, "corrupt snapshot: {detail}"),
            Self::CapacityExceeded {
                what,
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "heap capacity exceeded: {what} {requested} exceeds limit {capacity}"
                )
            }
            Self::InvalidName { name } => write!(f, "invalid field name '{name}'"),
            Self::UnknownObject { owner } => write!(f, "unknown object {owner}"),
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
        }
    }
}

impl Error for HeapError {}
