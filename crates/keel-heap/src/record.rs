//! Allocation records.

use smallvec::SmallVec;

use keel_core::{FieldType, ObjectId, Value};

/// Inline storage for record values. Scalars never spill to the heap.
pub(crate) type Values = SmallVec<[Value; 1]>;

/// One field in the heap: who owns it, what it is called, its type, and
/// its current value(s).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationRecord {
    pub(crate) owner: ObjectId,
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) values: Values,
}

impl AllocationRecord {
    /// A record holding the default value of `field_type` in every slot.
    pub(crate) fn zeroed(owner: ObjectId, name: String, field_type: FieldType) -> Self {
        let default = field_type.elem().default_value();
        let values = std::iter::repeat(default).take(field_type.len()).collect();
        Self {
            owner,
            name,
            field_type,
            values,
        }
    }

    /// The object that registered this field.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// The declared field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape and element type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Current values; one element for scalars.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ValueType;

    #[test]
    fn zeroed_array_has_len_defaults() {
        let r = AllocationRecord::zeroed(
            ObjectId(1),
            "slots".into(),
            FieldType::Array {
                elem: ValueType::Ref,
                len: 3,
            },
        );
        assert_eq!(r.values(), &[Value::Ref(None); 3]);
    }

    #[test]
    fn zeroed_scalar_stays_inline() {
        let r = AllocationRecord::zeroed(
            ObjectId(1),
            "hp".into(),
            FieldType::Scalar(ValueType::I32),
        );
        assert!(!r.values.spilled());
        assert_eq!(r.values(), &[Value::I32(0)]);
    }
}
