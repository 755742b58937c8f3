//! The simulation heap: owner of every persisted simulation field.
//!
//! [`SimHeap`] stores allocation records in a generational slot table and
//! keeps a separate insertion-ordered index keyed by `(owner, name)`. The
//! index is what serialization walks, so snapshot order is registration
//! order regardless of slot reuse.
//!
//! # Object lifecycle
//!
//! ```text
//! begin_object ──► Constructing ──finish_object──► Live ──release──► (gone)
//!                  (fields may be                (registration
//!                   registered)                   rejected)
//! ```
//!
//! Most callers never drive this directly; [`SimHeap::construct`] and
//! [`SimHeap::destroy`] wrap it for types implementing
//! [`HeapObject`](crate::HeapObject).

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use keel_core::{FieldType, HeapId, ObjectId, Value, ValueType};

use crate::codec::{self, DecodedRecord};
use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::handle::RecordHandle;
use crate::record::AllocationRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjectPhase {
    Constructing,
    Live,
}

#[derive(Clone, Debug)]
struct ObjectEntry {
    phase: ObjectPhase,
    /// Slots owned by this object, in registration order.
    slots: SmallVec<[u32; 8]>,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    record: Option<AllocationRecord>,
}

/// Arena that owns all deterministic, serializable simulation state.
///
/// One heap exists per scenario. It is `Send` but is only ever driven by
/// the simulation thread; `serialize` borrows it shared and `deserialize`
/// borrows it exclusively, so no field access can overlap a snapshot.
#[derive(Debug)]
pub struct SimHeap {
    id: HeapId,
    config: HeapConfig,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    /// Live records in insertion order.
    index: IndexMap<(ObjectId, String), u32>,
    objects: IndexMap<ObjectId, ObjectEntry>,
    next_object: u32,
}

impl SimHeap {
    /// Create an empty heap.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        Ok(Self {
            id: HeapId::next(),
            config,
            slots: Vec::new(),
            free_slots: Vec::new(),
            index: IndexMap::new(),
            objects: IndexMap::new(),
            next_object: 1,
        })
    }

    /// This heap's instance id.
    pub fn id(&self) -> HeapId {
        self.id
    }

    /// The configuration the heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Number of live allocation records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the heap holds no records.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of registered objects (constructing or live).
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether `owner` is registered and has finished construction.
    pub fn is_live(&self, owner: ObjectId) -> bool {
        self.objects
            .get(&owner)
            .is_some_and(|o| o.phase == ObjectPhase::Live)
    }

    /// Live records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> + '_ {
        self.index
            .values()
            .filter_map(|&slot| self.slots[slot as usize].record.as_ref())
    }

    /// Records owned by `owner`, in registration order.
    pub fn records_of(&self, owner: ObjectId) -> impl Iterator<Item = &AllocationRecord> + '_ {
        self.objects
            .get(&owner)
            .into_iter()
            .flat_map(|o| o.slots.iter())
            .filter_map(|&slot| self.slots[slot as usize].record.as_ref())
    }

    /// Look up an existing field by owner and name, for inspection.
    ///
    /// Only the record is returned, never a handle: write access to a
    /// field is held solely by whoever registered it.
    pub fn find(&self, owner: ObjectId, name: &str) -> Option<&AllocationRecord> {
        let slot = *self.index.get(&(owner, name.to_owned()))?;
        self.slots[slot as usize].record.as_ref()
    }

    // ── Object bookkeeping ──────────────────────────────────────

    /// Reserve a new object id in the constructing phase.
    pub fn begin_object(&mut self) -> Result<ObjectId, HeapError> {
        let id = ObjectId(self.next_object);
        self.next_object = self
            .next_object
            .checked_add(1)
            .ok_or(HeapError::CapacityExceeded {
                what: "object ids",
                requested: u32::MAX as usize,
                capacity: u32::MAX as usize - 1,
            })?;
        self.objects.insert(
            id,
            ObjectEntry {
                phase: ObjectPhase::Constructing,
                slots: SmallVec::new(),
            },
        );
        Ok(id)
    }

    /// Close the construction phase of `owner`. Idempotent.
    pub fn finish_object(&mut self, owner: ObjectId) -> Result<(), HeapError> {
        let entry = self
            .objects
            .get_mut(&owner)
            .ok_or(HeapError::UnknownObject { owner })?;
        entry.phase = ObjectPhase::Live;
        Ok(())
    }

    /// Free every record owned by `owner` and unregister it.
    ///
    /// All handles to those records become invalid, including after their
    /// slots are reused. Returns the number of records freed.
    pub fn release(&mut self, owner: ObjectId) -> Result<usize, HeapError> {
        let entry = self
            .objects
            .shift_remove(&owner)
            .ok_or(HeapError::UnknownObject { owner })?;
        for &slot in &entry.slots {
            let slot_ref = &mut self.slots[slot as usize];
            if let Some(record) = slot_ref.record.take() {
                self.index.shift_remove(&(owner, record.name));
            }
            // A slot whose generation would wrap is retired, so no stale
            // handle can ever match it again.
            if let Some(next) = slot_ref.generation.checked_add(1) {
                slot_ref.generation = next;
                self.free_slots.push(slot);
            }
        }
        debug!(%owner, records = entry.slots.len(), "released heap object");
        Ok(entry.slots.len())
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Register a scalar field for `owner`.
    ///
    /// # Errors
    ///
    /// [`HeapError::DuplicateField`] if `owner` already has `name`,
    /// [`HeapError::LateRegistration`] if `owner` finished construction,
    /// [`HeapError::UnknownObject`] if `owner` is not registered.
    pub fn allocate_scalar(
        &mut self,
        owner: ObjectId,
        name: &str,
        ty: ValueType,
    ) -> Result<RecordHandle, HeapError> {
        self.allocate(owner, name, FieldType::Scalar(ty))
    }

    /// Register a fixed-length array field for `owner`.
    ///
    /// Same errors as [`allocate_scalar`](Self::allocate_scalar), plus
    /// [`HeapError::CapacityExceeded`] if `len` exceeds
    /// [`HeapConfig::max_array_len`].
    pub fn allocate_array(
        &mut self,
        owner: ObjectId,
        name: &str,
        elem: ValueType,
        len: u32,
    ) -> Result<RecordHandle, HeapError> {
        if len > self.config.max_array_len {
            return Err(HeapError::CapacityExceeded {
                what: "array length",
                requested: len as usize,
                capacity: self.config.max_array_len as usize,
            });
        }
        self.allocate(owner, name, FieldType::Array { elem, len })
    }

    fn allocate(
        &mut self,
        owner: ObjectId,
        name: &str,
        field_type: FieldType,
    ) -> Result<RecordHandle, HeapError> {
        let phase = self
            .objects
            .get(&owner)
            .ok_or(HeapError::UnknownObject { owner })?
            .phase;
        if phase != ObjectPhase::Constructing {
            return Err(HeapError::LateRegistration {
                owner,
                name: name.to_owned(),
            });
        }
        if name.is_empty() || name.len() > self.config.max_name_len {
            return Err(HeapError::InvalidName {
                name: name.to_owned(),
            });
        }
        let key = (owner, name.to_owned());
        if self.index.contains_key(&key) {
            return Err(HeapError::DuplicateField {
                owner,
                name: key.1,
            });
        }
        if self.index.len() >= self.config.max_records {
            return Err(HeapError::CapacityExceeded {
                what: "records",
                requested: self.index.len() + 1,
                capacity: self.config.max_records,
            });
        }

        let record = AllocationRecord::zeroed(owner, key.1.clone(), field_type);
        let handle = self.place(record);
        self.index.insert(key, handle.slot);
        if let Some(entry) = self.objects.get_mut(&owner) {
            entry.slots.push(handle.slot);
        }
        Ok(handle)
    }

    fn place(&mut self, record: AllocationRecord) -> RecordHandle {
        if let Some(slot) = self.free_slots.pop() {
            let s = &mut self.slots[slot as usize];
            s.record = Some(record);
            RecordHandle::new(self.id, slot, s.generation)
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            RecordHandle::new(self.id, slot, 0)
        }
    }

    // ── Access ──────────────────────────────────────────────────

    fn resolve(&self, handle: RecordHandle) -> Result<&AllocationRecord, HeapError> {
        self.check_handle(handle)?;
        self.slots[handle.slot as usize]
            .record
            .as_ref()
            .ok_or_else(|| released(handle))
    }

    fn resolve_mut(&mut self, handle: RecordHandle) -> Result<&mut AllocationRecord, HeapError> {
        self.check_handle(handle)?;
        self.slots[handle.slot as usize]
            .record
            .as_mut()
            .ok_or_else(|| released(handle))
    }

    fn check_handle(&self, handle: RecordHandle) -> Result<(), HeapError> {
        if handle.heap != self.id {
            return Err(HeapError::InvalidHandle {
                detail: format!("{handle} was issued by heap {}, not {}", handle.heap, self.id),
            });
        }
        match self.slots.get(handle.slot as usize) {
            Some(slot) if slot.generation == handle.generation => Ok(()),
            _ => Err(released(handle)),
        }
    }

    /// The record behind `handle`.
    pub fn record(&self, handle: RecordHandle) -> Result<&AllocationRecord, HeapError> {
        self.resolve(handle)
    }

    /// Read a scalar field.
    pub fn read(&self, handle: RecordHandle) -> Result<Value, HeapError> {
        let record = self.resolve(handle)?;
        match record.field_type {
            FieldType::Scalar(_) => Ok(record.values[0]),
            field_type => Err(HeapError::ShapeMismatch {
                name: record.name.clone(),
                field_type,
            }),
        }
    }

    /// Write a scalar field.
    pub fn write(&mut self, handle: RecordHandle, value: Value) -> Result<(), HeapError> {
        let record = self.resolve_mut(handle)?;
        let FieldType::Scalar(ty) = record.field_type else {
            return Err(HeapError::ShapeMismatch {
                name: record.name.clone(),
                field_type: record.field_type,
            });
        };
        check_type(record, ty, value)?;
        record.values[0] = value;
        Ok(())
    }

    /// Read element `index` of an array field.
    pub fn read_element(&self, handle: RecordHandle, index: usize) -> Result<Value, HeapError> {
        let record = self.resolve(handle)?;
        array_index(record, index)?;
        Ok(record.values[index])
    }

    /// Write element `index` of an array field.
    pub fn write_element(
        &mut self,
        handle: RecordHandle,
        index: usize,
        value: Value,
    ) -> Result<(), HeapError> {
        let record = self.resolve_mut(handle)?;
        let elem = array_index(record, index)?;
        check_type(record, elem, value)?;
        record.values[index] = value;
        Ok(())
    }

    /// All values of a field (one for scalars).
    pub fn values(&self, handle: RecordHandle) -> Result<&[Value], HeapError> {
        Ok(self.resolve(handle)?.values())
    }

    // ── Snapshots ───────────────────────────────────────────────

    /// Encode every live record, in insertion order.
    ///
    /// The byte layout is documented in [`codec`](crate::codec).
    pub fn serialize(&self) -> Vec<u8> {
        codec::encode_snapshot(self.records())
    }

    /// Restore values from a snapshot into a heap with the same schema.
    ///
    /// The snapshot's records are matched to live records by
    /// `(owner, name)`. Handles held by game objects stay valid. The whole
    /// snapshot is decoded and checked before anything is written, so on
    /// error the heap is unchanged.
    ///
    /// # Errors
    ///
    /// [`HeapError::CorruptData`] on malformed bytes;
    /// [`HeapError::SchemaMismatch`] if a record's type differs from the
    /// live field's type, or if either side has a field the other lacks.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), HeapError> {
        let decoded = codec::decode_snapshot(bytes, &self.config)?;

        let mut targets = Vec::with_capacity(decoded.len());
        for record in &decoded {
            let key = (record.owner, record.name.clone());
            let Some(&slot) = self.index.get(&key) else {
                return Err(HeapError::SchemaMismatch {
                    owner: record.owner,
                    name: key.1,
                    expected: None,
                    found: Some(record.field_type),
                });
            };
            let live_type = self.slots[slot as usize]
                .record
                .as_ref()
                .map(|r| r.field_type);
            if live_type != Some(record.field_type) {
                return Err(HeapError::SchemaMismatch {
                    owner: record.owner,
                    name: key.1,
                    expected: live_type,
                    found: Some(record.field_type),
                });
            }
            targets.push(slot);
        }

        // Stream keys are unique and all present, so equal counts mean
        // equal key sets.
        if decoded.len() != self.index.len() {
            if let Some(((owner, name), &slot)) = self.index.iter().find(|(key, _)| {
                !decoded
                    .iter()
                    .any(|d| d.owner == key.0 && d.name == key.1)
            }) {
                return Err(HeapError::SchemaMismatch {
                    owner: *owner,
                    name: name.clone(),
                    expected: self.slots[slot as usize].record.as_ref().map(|r| r.field_type),
                    found: None,
                });
            }
        }

        for (record, slot) in decoded.into_iter().zip(targets) {
            if let Some(live) = self.slots[slot as usize].record.as_mut() {
                live.values = record.values.into_iter().collect();
            }
        }
        debug!(records = self.index.len(), "restored heap snapshot");
        Ok(())
    }

    /// Build a fresh heap whose records are exactly those in `bytes`.
    ///
    /// Objects named in the snapshot are registered as live, so further
    /// registration on them fails with [`HeapError::LateRegistration`].
    /// Objects with no fields are not part of the format and are not
    /// recreated. New object ids continue after the largest id present.
    pub fn from_bytes(bytes: &[u8], config: HeapConfig) -> Result<Self, HeapError> {
        let mut heap = Self::new(config)?;
        let decoded = codec::decode_snapshot(bytes, &heap.config)?;
        for DecodedRecord {
            owner,
            name,
            field_type,
            values,
        } in decoded
        {
            let entry = heap.objects.entry(owner).or_insert_with(|| ObjectEntry {
                phase: ObjectPhase::Live,
                slots: SmallVec::new(),
            });
            heap.next_object = heap.next_object.max(owner.0.saturating_add(1));
            let record = AllocationRecord {
                owner,
                name: name.clone(),
                field_type,
                values: values.into_iter().collect(),
            };
            let slot = match heap.free_slots.pop() {
                Some(slot) => slot,
                None => {
                    heap.slots.push(Slot {
                        generation: 0,
                        record: None,
                    });
                    heap.slots.len() as u32 - 1
                }
            };
            entry.slots.push(slot);
            heap.slots[slot as usize].record = Some(record);
            heap.index.insert((owner, name), slot);
        }
        debug!(records = heap.index.len(), "rebuilt heap from snapshot");
        Ok(heap)
    }
}

fn released(handle: RecordHandle) -> HeapError {
    HeapError::InvalidHandle {
        detail: format!("{handle} refers to a released record"),
    }
}

fn check_type(record: &AllocationRecord, expected: ValueType, value: Value) -> Result<(), HeapError> {
    let found = value.value_type();
    if found != expected {
        return Err(HeapError::TypeMismatch {
            name: record.name.clone(),
            expected,
            found,
        });
    }
    Ok(())
}

fn array_index(record: &AllocationRecord, index: usize) -> Result<ValueType, HeapError> {
    match record.field_type {
        FieldType::Array { elem, len } if index < len as usize => Ok(elem),
        FieldType::Array { len, .. } => Err(HeapError::IndexOutOfBounds {
            name: record.name.clone(),
            index,
            len: len as usize,
        }),
        field_type => Err(HeapError::ShapeMismatch {
            name: record.name.clone(),
            field_type,
        }),
    }
}
