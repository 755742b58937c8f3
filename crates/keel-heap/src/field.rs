//! Typed field handles.
//!
//! [`ScalarField<T>`] and [`ArrayField<T>`] wrap a [`RecordHandle`] with
//! the Rust type of the stored value. They are the only way game code
//! reads or writes heap-resident state. Handles are `Copy`; the heap is
//! passed explicitly to every access so the borrow checker sees exactly
//! when state is read and mutated.

use std::fmt;
use std::marker::PhantomData;

use keel_core::FieldValue;

use crate::error::HeapError;
use crate::handle::RecordHandle;
use crate::heap::SimHeap;

fn decode<T: FieldValue>(heap: &SimHeap, raw: RecordHandle, value: keel_core::Value) -> Result<T, HeapError> {
    T::from_value(value).ok_or_else(|| HeapError::TypeMismatch {
        name: heap
            .record(raw)
            .map(|r| r.name().to_owned())
            .unwrap_or_default(),
        expected: T::TYPE,
        found: value.value_type(),
    })
}

/// Handle to a single heap-resident value of type `T`.
pub struct ScalarField<T> {
    raw: RecordHandle,
    _ty: PhantomData<fn() -> T>,
}

impl<T: FieldValue> ScalarField<T> {
    pub(crate) fn new(raw: RecordHandle) -> Self {
        Self {
            raw,
            _ty: PhantomData,
        }
    }

    /// The untyped handle.
    pub fn raw(&self) -> RecordHandle {
        self.raw
    }

    /// Current value; the type's default if never written.
    pub fn get(&self, heap: &SimHeap) -> Result<T, HeapError> {
        let value = heap.read(self.raw)?;
        decode(heap, self.raw, value)
    }

    /// Replace the value.
    pub fn set(&self, heap: &mut SimHeap, value: T) -> Result<(), HeapError> {
        heap.write(self.raw, value.into_value())
    }

    /// Read, transform and write back. Returns the new value.
    pub fn update(&self, heap: &mut SimHeap, f: impl FnOnce(T) -> T) -> Result<T, HeapError> {
        let next = f(self.get(heap)?);
        self.set(heap, next)?;
        Ok(next)
    }
}

impl<T> Clone for ScalarField<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ScalarField<T> {}

impl<T> PartialEq for ScalarField<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ScalarField<T> {}

impl<T> fmt::Debug for ScalarField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScalarField").field(&self.raw).finish()
    }
}

/// Handle to a fixed-length heap-resident array of `T`.
///
/// The length is fixed at registration. Element access past the end fails
/// with [`HeapError::IndexOutOfBounds`]; nothing is clamped.
pub struct ArrayField<T> {
    raw: RecordHandle,
    len: u32,
    _ty: PhantomData<fn() -> T>,
}

impl<T: FieldValue> ArrayField<T> {
    pub(crate) fn new(raw: RecordHandle, len: u32) -> Self {
        Self {
            raw,
            len,
            _ty: PhantomData,
        }
    }

    /// The untyped handle.
    pub fn raw(&self) -> RecordHandle {
        self.raw
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the array has zero elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element `index`.
    pub fn get(&self, heap: &SimHeap, index: usize) -> Result<T, HeapError> {
        let value = heap.read_element(self.raw, index)?;
        decode(heap, self.raw, value)
    }

    /// Replace element `index`.
    pub fn set(&self, heap: &mut SimHeap, index: usize, value: T) -> Result<(), HeapError> {
        heap.write_element(self.raw, index, value.into_value())
    }

    /// Copy every element out.
    pub fn to_vec(&self, heap: &SimHeap) -> Result<Vec<T>, HeapError> {
        heap.values(self.raw)?
            .iter()
            .map(|&v| decode(heap, self.raw, v))
            .collect()
    }

    /// Overwrite the array from a slice of exactly `len()` elements.
    pub fn copy_from(&self, heap: &mut SimHeap, values: &[T]) -> Result<(), HeapError> {
        if values.len() != self.len() {
            let name = heap.record(self.raw)?.name().to_owned();
            return Err(HeapError::IndexOutOfBounds {
                name,
                index: values.len(),
                len: self.len(),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.set(heap, i, v)?;
        }
        Ok(())
    }
}

impl<T> Clone for ArrayField<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArrayField<T> {}

impl<T> PartialEq for ArrayField<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ArrayField<T> {}

impl<T> fmt::Debug for ArrayField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayField")
            .field("raw", &self.raw)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapConfig;
    use keel_core::{Fixed, ObjectId, ValueType};

    #[test]
    fn scalar_get_set_update() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let o = heap.begin_object().unwrap();
        let f: ScalarField<u32> =
            ScalarField::new(heap.allocate_scalar(o, "count", ValueType::U32).unwrap());
        assert_eq!(f.get(&heap).unwrap(), 0);
        f.set(&mut heap, 4).unwrap();
        assert_eq!(f.update(&mut heap, |v| v * 2).unwrap(), 8);
        assert_eq!(f.get(&heap).unwrap(), 8);
    }

    #[test]
    fn reference_field_defaults_to_null() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let o = heap.begin_object().unwrap();
        let f: ScalarField<Option<ObjectId>> =
            ScalarField::new(heap.allocate_scalar(o, "owner", ValueType::Ref).unwrap());
        assert_eq!(f.get(&heap).unwrap(), None);
        f.set(&mut heap, Some(o)).unwrap();
        assert_eq!(f.get(&heap).unwrap(), Some(o));
    }

    #[test]
    fn array_copy_from_checks_length() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let o = heap.begin_object().unwrap();
        let f: ArrayField<Fixed> = ArrayField::new(
            heap.allocate_array(o, "pos", ValueType::Fixed, 2).unwrap(),
            2,
        );
        let one = Fixed::from_num(1);
        f.copy_from(&mut heap, &[one, -one]).unwrap();
        assert_eq!(f.to_vec(&heap).unwrap(), vec![one, -one]);
        assert!(matches!(
            f.copy_from(&mut heap, &[one]),
            Err(HeapError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            f.get(&heap, 2),
            Err(HeapError::IndexOutOfBounds { index: 2, len: 2, .. })
        ));
    }
}
