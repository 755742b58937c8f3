//! Hashing utilities for lockstep state comparison.
//!
//! Uses FNV-1a for fast, deterministic hashing of heap contents. These
//! hashes are not cryptographically secure; peers exchange them each frame
//! to detect desyncs cheaply.

use crate::codec;
use crate::heap::SimHeap;

/// FNV-1a offset basis for 64-bit.
pub const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// Fold `bytes` into an existing FNV-1a state.
pub fn fold_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// FNV-1a hash of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    fold_bytes(FNV_OFFSET, bytes)
}

/// Hash every live record of `heap` in insertion order.
///
/// Equal to `hash_bytes` over the record section of
/// [`SimHeap::serialize`], without materialising the whole snapshot.
/// Returns [`FNV_OFFSET`] for an empty heap.
pub fn snapshot_hash(heap: &SimHeap) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut scratch = Vec::new();
    for record in heap.records() {
        scratch.clear();
        codec::encode_record(&mut scratch, record);
        hash = fold_bytes(hash, &scratch);
    }
    hash
}
