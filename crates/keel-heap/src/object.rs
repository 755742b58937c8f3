//! The heap-backed object capability.
//!
//! A simulation type becomes heap-backed by implementing [`HeapObject`]:
//! its constructor receives a [`Constructor`] and registers every
//! persistent field through it. Derivation is by composition: a "derived"
//! type holds its base by value and calls the base's
//! [`construct`](HeapObject::construct) first with the same `Constructor`,
//! so the base registers its fields before the derived type registers its
//! own, all under one owner id.
//!
//! ```
//! use keel_heap::{Constructor, HeapConfig, HeapError, HeapObject, ScalarField, SimHeap};
//! use keel_core::ObjectId;
//!
//! struct Mobile {
//!     id: ObjectId,
//!     speed: ScalarField<u32>,
//! }
//!
//! impl HeapObject for Mobile {
//!     type Args = u32;
//!     fn construct(ctor: &mut Constructor<'_>, speed: u32) -> Result<Self, HeapError> {
//!         Ok(Self { id: ctor.owner(), speed: ctor.field_with("speed", speed)? })
//!     }
//!     fn object_id(&self) -> ObjectId { self.id }
//! }
//!
//! struct Tank {
//!     base: Mobile,
//!     armor: ScalarField<i32>,
//! }
//!
//! impl HeapObject for Tank {
//!     type Args = (u32, i32);
//!     fn construct(ctor: &mut Constructor<'_>, (speed, armor): (u32, i32)) -> Result<Self, HeapError> {
//!         let base = Mobile::construct(ctor, speed)?;
//!         Ok(Self { base, armor: ctor.field_with("armor", armor)? })
//!     }
//!     fn object_id(&self) -> ObjectId { self.base.object_id() }
//! }
//!
//! let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
//! let tank: Tank = heap.construct((3, 50)).unwrap();
//! assert_eq!(tank.base.speed.get(&heap).unwrap(), 3);
//! assert_eq!(heap.records_of(tank.object_id()).count(), 2);
//! ```
//!
//! # Transient members
//!
//! Plain Rust fields on a heap-backed type (counters, caches, scratch
//! buffers) are allowed, but they live outside the heap: they are not
//! serialized, not restored by [`SimHeap::deserialize`], and not covered by
//! the determinism contract. Anything that must survive save/restore or be
//! identical across lockstep peers has to be a registered field.

use tracing::warn;

use keel_core::{FieldValue, ObjectId};

use crate::error::HeapError;
use crate::field::{ArrayField, ScalarField};
use crate::heap::SimHeap;

/// Construction-phase access to the heap for one object.
///
/// Only [`SimHeap::construct`] creates a `Constructor`, and it is dropped
/// before `construct` returns, so registration after construction cannot
/// be expressed through this type. The raw heap allocation API rejects it
/// at runtime with [`HeapError::LateRegistration`].
pub struct Constructor<'h> {
    heap: &'h mut SimHeap,
    owner: ObjectId,
}

impl Constructor<'_> {
    /// The id of the object under construction.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Register a scalar field. It reads as the zero value of `T` until written.
    pub fn field<T: FieldValue>(&mut self, name: &str) -> Result<ScalarField<T>, HeapError> {
        let raw = self.heap.allocate_scalar(self.owner, name, T::TYPE)?;
        Ok(ScalarField::new(raw))
    }

    /// Register a scalar field and write its initial value.
    pub fn field_with<T: FieldValue>(
        &mut self,
        name: &str,
        init: T,
    ) -> Result<ScalarField<T>, HeapError> {
        let field = self.field(name)?;
        field.set(self.heap, init)?;
        Ok(field)
    }

    /// Register a zeroed array field of `len` elements.
    pub fn array_field<T: FieldValue>(
        &mut self,
        name: &str,
        len: u32,
    ) -> Result<ArrayField<T>, HeapError> {
        let raw = self.heap.allocate_array(self.owner, name, T::TYPE, len)?;
        Ok(ArrayField::new(raw, len))
    }

    /// Register an array field initialised from `init`.
    pub fn array_field_with<T: FieldValue>(
        &mut self,
        name: &str,
        init: &[T],
    ) -> Result<ArrayField<T>, HeapError> {
        let len = u32::try_from(init.len()).map_err(|_| HeapError::CapacityExceeded {
            what: "array length",
            requested: init.len(),
            capacity: self.heap.config().max_array_len as usize,
        })?;
        let field = self.array_field(name, len)?;
        field.copy_from(self.heap, init)?;
        Ok(field)
    }
}

/// A simulation type whose persistent state lives in a [`SimHeap`].
pub trait HeapObject: Sized {
    /// Construction parameters.
    type Args;

    /// Register fields and build the object.
    ///
    /// Implementations of derived types call their base's `construct` with
    /// the same `ctor` before registering their own fields.
    fn construct(ctor: &mut Constructor<'_>, args: Self::Args) -> Result<Self, HeapError>;

    /// The owner id every field of this object is registered under.
    fn object_id(&self) -> ObjectId;
}

impl SimHeap {
    /// Construct a heap-backed object.
    ///
    /// Reserves an owner id, runs the constructor chain, then closes the
    /// construction phase. If any registration fails, every field already
    /// registered for the new owner is released before the error is
    /// returned.
    pub fn construct<T: HeapObject>(&mut self, args: T::Args) -> Result<T, HeapError> {
        let owner = self.begin_object()?;
        let built = {
            let mut ctor = Constructor { heap: self, owner };
            T::construct(&mut ctor, args)
        };
        match built {
            Ok(object) => {
                debug_assert_eq!(object.object_id(), owner);
                self.finish_object(owner)?;
                Ok(object)
            }
            Err(err) => {
                if let Err(release_err) = self.release(owner) {
                    warn!(%owner, %release_err, "rollback of failed construction failed");
                }
                Err(err)
            }
        }
    }

    /// Destroy a heap-backed object, releasing all of its fields.
    ///
    /// Takes the object by value so release happens exactly once. Returns
    /// the number of records freed.
    pub fn destroy<T: HeapObject>(&mut self, object: T) -> Result<usize, HeapError> {
        self.release(object.object_id())
    }
}
