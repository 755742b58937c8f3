//! Snapshot round-trip and lifecycle integration tests.

use keel_core::{FieldType, Fixed, ObjectId, Value, ValueType};
use keel_heap::{
    compare_snapshots, snapshot_hash, ArrayField, Constructor, HeapConfig, HeapError, HeapObject,
    RecordHandle, ScalarField, SimHeap,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────

fn arb_value(ty: ValueType) -> BoxedStrategy<Value> {
    match ty {
        ValueType::I8 => any::<i8>().prop_map(Value::I8).boxed(),
        ValueType::I16 => any::<i16>().prop_map(Value::I16).boxed(),
        ValueType::I32 => any::<i32>().prop_map(Value::I32).boxed(),
        ValueType::I64 => any::<i64>().prop_map(Value::I64).boxed(),
        ValueType::U8 => any::<u8>().prop_map(Value::U8).boxed(),
        ValueType::U16 => any::<u16>().prop_map(Value::U16).boxed(),
        ValueType::U32 => any::<u32>().prop_map(Value::U32).boxed(),
        ValueType::U64 => any::<u64>().prop_map(Value::U64).boxed(),
        ValueType::Fixed => any::<i64>()
            .prop_map(|bits| Value::Fixed(Fixed::from_bits(bits)))
            .boxed(),
        ValueType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Ref => proptest::option::of(any::<u32>().prop_map(ObjectId))
            .prop_map(Value::Ref)
            .boxed(),
    }
}

fn arb_field_type() -> impl Strategy<Value = FieldType> {
    (proptest::sample::select(ValueType::ALL.to_vec()), 0u32..5).prop_map(|(elem, len)| {
        if len == 0 {
            FieldType::Scalar(elem)
        } else {
            FieldType::Array { elem, len }
        }
    })
}

/// A field type together with values for every element.
fn arb_field() -> impl Strategy<Value = (FieldType, Vec<Value>)> {
    arb_field_type().prop_flat_map(|ft| {
        proptest::collection::vec(arb_value(ft.elem()), ft.len()).prop_map(move |v| (ft, v))
    })
}

/// Objects, each a list of fields.
fn arb_schema() -> impl Strategy<Value = Vec<Vec<(FieldType, Vec<Value>)>>> {
    proptest::collection::vec(proptest::collection::vec(arb_field(), 0..6), 1..5)
}

fn build(schema: &[Vec<(FieldType, Vec<Value>)>]) -> SimHeap {
    build_tracked(schema).0
}

/// Like [`build`], also returning the handles of every `i8` scalar.
fn build_tracked(schema: &[Vec<(FieldType, Vec<Value>)>]) -> (SimHeap, Vec<RecordHandle>) {
    let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
    let mut i8_fields = Vec::new();
    for fields in schema {
        let owner = heap.begin_object().unwrap();
        for (i, (ft, values)) in fields.iter().enumerate() {
            let name = format!("f{i}");
            match *ft {
                FieldType::Scalar(ty) => {
                    let h = heap.allocate_scalar(owner, &name, ty).unwrap();
                    heap.write(h, values[0]).unwrap();
                    if ty == ValueType::I8 {
                        i8_fields.push(h);
                    }
                }
                FieldType::Array { elem, len } => {
                    let h = heap.allocate_array(owner, &name, elem, len).unwrap();
                    for (j, v) in values.iter().enumerate() {
                        heap.write_element(h, j, *v).unwrap();
                    }
                }
            }
        }
        heap.finish_object(owner).unwrap();
    }
    (heap, i8_fields)
}

fn triples(heap: &SimHeap) -> Vec<(ObjectId, String, FieldType, Vec<Value>)> {
    heap.records()
        .map(|r| {
            (
                r.owner(),
                r.name().to_owned(),
                r.field_type(),
                r.values().to_vec(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn from_bytes_reproduces_every_record(schema in arb_schema()) {
        let heap = build(&schema);
        let bytes = heap.serialize();
        let rebuilt = SimHeap::from_bytes(&bytes, HeapConfig::default()).unwrap();
        prop_assert_eq!(triples(&rebuilt), triples(&heap));
        prop_assert_eq!(snapshot_hash(&rebuilt), snapshot_hash(&heap));
    }

    #[test]
    fn deserialize_undoes_later_writes(schema in arb_schema(), bump in any::<i8>()) {
        let (mut heap, handles) = build_tracked(&schema);
        let before = triples(&heap);
        let bytes = heap.serialize();

        for h in handles {
            heap.write(h, Value::I8(bump)).unwrap();
        }

        heap.deserialize(&bytes).unwrap();
        prop_assert_eq!(triples(&heap), before);
        prop_assert!(compare_snapshots(&bytes, &heap.serialize()).unwrap().is_none());
    }

    #[test]
    fn truncated_snapshots_are_corrupt(schema in arb_schema(), cut in any::<prop::sample::Index>()) {
        let heap = build(&schema);
        let bytes = heap.serialize();
        let len = cut.index(bytes.len());
        let err = SimHeap::from_bytes(&bytes[..len], HeapConfig::default()).unwrap_err();
        prop_assert!(
            matches!(err, HeapError::CorruptData { .. }),
            "expected CorruptData, got {:?}",
            err
        );
    }
}

// ── Heap-backed objects ─────────────────────────────────────────

struct Crate {
    id: ObjectId,
    weight: ScalarField<Fixed>,
    sealed: ScalarField<bool>,
    contents: ArrayField<u16>,
}

impl HeapObject for Crate {
    type Args = (Fixed, [u16; 3]);

    fn construct(
        ctor: &mut Constructor<'_>,
        (weight, contents): Self::Args,
    ) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            weight: ctor.field_with("weight", weight)?,
            sealed: ctor.field("sealed")?,
            contents: ctor.array_field_with("contents", &contents)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

#[test]
fn objects_survive_save_and_restore() {
    let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
    let a: Crate = heap.construct((Fixed::from_num(2.5), [1, 2, 3])).unwrap();
    let b: Crate = heap.construct((Fixed::from_num(1), [0, 0, 9])).unwrap();
    a.sealed.set(&mut heap, true).unwrap();
    let saved = heap.serialize();

    a.weight.set(&mut heap, Fixed::ZERO).unwrap();
    b.contents.set(&mut heap, 2, 4).unwrap();
    let report = compare_snapshots(&saved, &heap.serialize())
        .unwrap()
        .unwrap();
    assert_eq!(report.divergences.len(), 2);

    heap.deserialize(&saved).unwrap();
    assert_eq!(a.weight.get(&heap).unwrap(), Fixed::from_num(2.5));
    assert!(a.sealed.get(&heap).unwrap());
    assert_eq!(b.contents.to_vec(&heap).unwrap(), vec![0, 0, 9]);
}

#[test]
fn restore_after_destroy_is_schema_mismatch() {
    let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
    let a: Crate = heap.construct((Fixed::ZERO, [0; 3])).unwrap();
    let _b: Crate = heap.construct((Fixed::ZERO, [0; 3])).unwrap();
    let saved = heap.serialize();

    heap.destroy(a).unwrap();
    let err = heap.deserialize(&saved).unwrap_err();
    assert!(matches!(
        err,
        HeapError::SchemaMismatch { expected: None, .. }
    ));
}

#[test]
fn handles_are_scoped_to_their_heap() {
    let mut first = SimHeap::new(HeapConfig::default()).unwrap();
    let mut second = SimHeap::new(HeapConfig::default()).unwrap();
    let a: Crate = first.construct((Fixed::ZERO, [0; 3])).unwrap();
    let _b: Crate = second.construct((Fixed::ZERO, [0; 3])).unwrap();
    assert!(matches!(
        a.sealed.get(&second),
        Err(HeapError::InvalidHandle { .. })
    ));
    assert!(matches!(
        a.sealed.set(&mut second, true),
        Err(HeapError::InvalidHandle { .. })
    ));
}
