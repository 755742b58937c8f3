//! Snapshot comparison for desync diagnosis.
//!
//! Hash-first comparison (fast path) with a per-record fallback on
//! mismatch that names exactly which fields differ.

use indexmap::IndexMap;

use keel_core::{FieldType, ObjectId, Value};

use crate::codec::{self, DecodedRecord};
use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::hash::hash_bytes;

/// How a single record differs between two snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum DivergenceKind {
    /// Present in the expected snapshot only.
    Missing,
    /// Present in the actual snapshot only.
    Unexpected,
    /// Same key, different declared type.
    TypeChanged {
        /// Type in the expected snapshot.
        expected: FieldType,
        /// Type in the actual snapshot.
        actual: FieldType,
    },
    /// Same key and type; the first differing element.
    ValueChanged {
        /// Element index (0 for scalars).
        index: usize,
        /// Expected value.
        expected: Value,
        /// Actual value.
        actual: Value,
    },
    /// Same records, different registration order.
    ///
    /// Positions count only records present in both snapshots, so a
    /// missing or unexpected record does not shift the others.
    Reordered {
        /// Position among shared records in the expected snapshot.
        expected_position: usize,
        /// Position among shared records in the actual snapshot.
        actual_position: usize,
    },
}

/// One record-level divergence.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordDivergence {
    /// Owning object.
    pub owner: ObjectId,
    /// Field name.
    pub name: String,
    /// What differs.
    pub kind: DivergenceKind,
}

/// Every divergence between two snapshots, in expected-snapshot order
/// followed by unexpected records in actual-snapshot order.
#[derive(Clone, Debug)]
pub struct DivergenceReport {
    /// Hash of the expected snapshot.
    pub expected_hash: u64,
    /// Hash of the actual snapshot.
    pub actual_hash: u64,
    /// Record-level detail.
    pub divergences: Vec<RecordDivergence>,
}

/// Compare two encoded snapshots.
///
/// Returns `Ok(None)` when the bytes hash equal. Otherwise both are decoded
/// (with default limits) and compared record by record.
pub fn compare_snapshots(
    expected: &[u8],
    actual: &[u8],
) -> Result<Option<DivergenceReport>, HeapError> {
    let expected_hash = hash_bytes(expected);
    let actual_hash = hash_bytes(actual);
    if expected_hash == actual_hash && expected == actual {
        return Ok(None);
    }

    let config = HeapConfig::default();
    let expected_records = keyed(codec::decode_snapshot(expected, &config)?);
    let actual_records = keyed(codec::decode_snapshot(actual, &config)?);

    let actual_order: IndexMap<&RecordKey, usize> = actual_records
        .keys()
        .filter(|key| expected_records.contains_key(*key))
        .enumerate()
        .map(|(position, key)| (key, position))
        .collect();

    let mut divergences = Vec::new();
    let mut expected_position = 0;
    for (key, exp) in &expected_records {
        let (owner, name) = key.clone();
        let (Some(act), Some(&actual_position)) = (actual_records.get(key), actual_order.get(key))
        else {
            divergences.push(RecordDivergence {
                owner,
                name,
                kind: DivergenceKind::Missing,
            });
            continue;
        };
        let position = expected_position;
        expected_position += 1;
        if exp.field_type != act.field_type {
            divergences.push(RecordDivergence {
                owner,
                name,
                kind: DivergenceKind::TypeChanged {
                    expected: exp.field_type,
                    actual: act.field_type,
                },
            });
            continue;
        }
        if let Some((index, (&e, &a))) = exp
            .values
            .iter()
            .zip(&act.values)
            .enumerate()
            .find(|(_, (e, a))| e != a)
        {
            divergences.push(RecordDivergence {
                owner,
                name,
                kind: DivergenceKind::ValueChanged {
                    index,
                    expected: e,
                    actual: a,
                },
            });
        } else if position != actual_position {
            divergences.push(RecordDivergence {
                owner,
                name,
                kind: DivergenceKind::Reordered {
                    expected_position: position,
                    actual_position,
                },
            });
        }
    }
    for (key, _) in &actual_records {
        if !expected_records.contains_key(key) {
            divergences.push(RecordDivergence {
                owner: key.0,
                name: key.1.clone(),
                kind: DivergenceKind::Unexpected,
            });
        }
    }

    Ok(Some(DivergenceReport {
        expected_hash,
        actual_hash,
        divergences,
    }))
}

type RecordKey = (ObjectId, String);

fn keyed(records: Vec<DecodedRecord>) -> IndexMap<RecordKey, DecodedRecord> {
    records
        .into_iter()
        .map(|r| ((r.owner, r.name.clone()), r))
        .collect()
}
