//! Binary encode/decode for heap snapshots.
//!
//! All integers are little-endian. Strings are length-prefixed with a `u32`
//! length. The format is intentionally simple: no compression, no alignment
//! padding, no self-describing schema beyond the per-record type tag.
//!
//! ```text
//! [MAGIC "KEEL"] [VERSION u8]
//! [RECORD 0x01] [owner u32] [name] [type tag u8] ([len u32] if array) [values]
//! ...
//! [END 0x00]
//! ```

use indexmap::IndexSet;

use keel_core::{FieldType, Fixed, ObjectId, Value, ValueType};

use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::record::AllocationRecord;

/// Magic bytes at the start of every heap snapshot.
pub const MAGIC: [u8; 4] = *b"KEEL";

/// Current snapshot format version.
pub const FORMAT_VERSION: u8 = 1;

/// Byte that introduces each record.
pub const RECORD_MARKER: u8 = 0x01;

/// Byte that terminates the record sequence.
pub const END_MARKER: u8 = 0x00;

/// A record as read from a snapshot, before it is matched against a heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Owning object.
    pub owner: ObjectId,
    /// Field name.
    pub name: String,
    /// Recorded type.
    pub field_type: FieldType,
    /// Recorded values, `field_type.len()` of them.
    pub values: Vec<Value>,
}

// ── Encoding ────────────────────────────────────────────────────

fn write_u32_le(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_length_prefixed_str(buf: &mut Vec<u8>, s: &str) {
    write_u32_le(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

/// Append the encoding of one value (without its type tag).
pub fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match *value {
        Value::I8(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::I16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::I32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U8(v) => buf.push(v),
        Value::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::U64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Fixed(v) => buf.extend_from_slice(&v.to_bits().to_le_bytes()),
        Value::Bool(v) => buf.push(u8::from(v)),
        // Presence flag + value, so ObjectId(0) never doubles as null.
        Value::Ref(Some(id)) => {
            buf.push(1);
            write_u32_le(buf, id.0);
        }
        Value::Ref(None) => buf.push(0),
    }
}

/// Append one record.
pub fn encode_record(buf: &mut Vec<u8>, record: &AllocationRecord) {
    buf.push(RECORD_MARKER);
    write_u32_le(buf, record.owner().0);
    write_length_prefixed_str(buf, record.name());
    let field_type = record.field_type();
    buf.push(field_type.tag());
    if let FieldType::Array { len, .. } = field_type {
        write_u32_le(buf, len);
    }
    for value in record.values() {
        write_value(buf, value);
    }
}

/// Encode a complete snapshot from records in iteration order.
pub fn encode_snapshot<'a>(records: impl IntoIterator<Item = &'a AllocationRecord>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&MAGIC);
    buf.push(FORMAT_VERSION);
    for record in records {
        encode_record(&mut buf, record);
    }
    buf.push(END_MARKER);
    buf
}

// ── Decoding ────────────────────────────────────────────────────

/// Cursor over snapshot bytes. Every read is bounds-checked and reports
/// truncation as [`HeapError::CorruptData`].
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], HeapError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| HeapError::CorruptData {
                detail: format!("truncated {what} at byte {}", self.pos),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], HeapError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, HeapError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32, HeapError> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn read_value(r: &mut ByteReader<'_>, ty: ValueType) -> Result<Value, HeapError> {
    let value = match ty {
        ValueType::I8 => Value::I8(i8::from_le_bytes(r.array("i8")?)),
        ValueType::I16 => Value::I16(i16::from_le_bytes(r.array("i16")?)),
        ValueType::I32 => Value::I32(i32::from_le_bytes(r.array("i32")?)),
        ValueType::I64 => Value::I64(i64::from_le_bytes(r.array("i64")?)),
        ValueType::U8 => Value::U8(r.u8("u8")?),
        ValueType::U16 => Value::U16(u16::from_le_bytes(r.array("u16")?)),
        ValueType::U32 => Value::U32(r.u32("u32")?),
        ValueType::U64 => Value::U64(u64::from_le_bytes(r.array("u64")?)),
        ValueType::Fixed => Value::Fixed(Fixed::from_bits(i64::from_le_bytes(r.array("fixed")?))),
        ValueType::Bool => match r.u8("bool")? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(HeapError::CorruptData {
                    detail: format!("invalid bool byte {other}"),
                })
            }
        },
        ValueType::Ref => match r.u8("ref flag")? {
            0 => Value::Ref(None),
            1 => Value::Ref(Some(ObjectId(r.u32("ref")?))),
            flag => {
                return Err(HeapError::CorruptData {
                    detail: format!("invalid ref presence flag {flag}"),
                })
            }
        },
    };
    Ok(value)
}

fn read_field_type(
    r: &mut ByteReader<'_>,
    config: &HeapConfig,
) -> Result<FieldType, HeapError> {
    let tag = r.u8("type tag")?;
    let elem = ValueType::from_tag(tag & !FieldType::ARRAY_FLAG).ok_or_else(|| {
        HeapError::CorruptData {
            detail: format!("unknown type tag {tag:#04x}"),
        }
    })?;
    if tag & FieldType::ARRAY_FLAG == 0 {
        return Ok(FieldType::Scalar(elem));
    }
    let len = r.u32("array length")?;
    if len > config.max_array_len {
        return Err(HeapError::CorruptData {
            detail: format!(
                "array length {len} exceeds limit {}",
                config.max_array_len
            ),
        });
    }
    Ok(FieldType::Array { elem, len })
}

fn read_record(r: &mut ByteReader<'_>, config: &HeapConfig) -> Result<DecodedRecord, HeapError> {
    let owner = ObjectId(r.u32("owner id")?);
    if owner.0 == 0 {
        return Err(HeapError::CorruptData {
            detail: "owner id 0 is reserved".into(),
        });
    }
    let name_len = r.u32("name length")? as usize;
    if name_len == 0 || name_len > config.max_name_len {
        return Err(HeapError::CorruptData {
            detail: format!("field name length {name_len} out of range"),
        });
    }
    let name = std::str::from_utf8(r.take(name_len, "field name")?)
        .map_err(|e| HeapError::CorruptData {
            detail: format!("invalid UTF-8 field name: {e}"),
        })?
        .to_owned();
    let field_type = read_field_type(r, config)?;
    let mut values = Vec::with_capacity(field_type.len());
    for _ in 0..field_type.len() {
        values.push(read_value(r, field_type.elem())?);
    }
    Ok(DecodedRecord {
        owner,
        name,
        field_type,
        values,
    })
}

/// Decode and validate a complete snapshot.
///
/// Checks the header, every record, the end marker, the absence of
/// trailing bytes, and that no `(owner, name)` pair appears twice. Returns
/// the records in stream order.
pub fn decode_snapshot(
    bytes: &[u8],
    config: &HeapConfig,
) -> Result<Vec<DecodedRecord>, HeapError> {
    let mut r = ByteReader::new(bytes);

    if r.array::<4>("magic")? != MAGIC {
        return Err(HeapError::CorruptData {
            detail: "invalid magic bytes (expected b\"KEEL\")".into(),
        });
    }
    let version = r.u8("format version")?;
    if version != FORMAT_VERSION {
        return Err(HeapError::CorruptData {
            detail: format!("unsupported format version {version}"),
        });
    }

    let mut records = Vec::new();
    let mut seen = IndexSet::new();
    loop {
        match r.u8("record marker")? {
            END_MARKER => break,
            RECORD_MARKER => {
                let record = read_record(&mut r, config)?;
                if !seen.insert((record.owner, record.name.clone())) {
                    return Err(HeapError::CorruptData {
                        detail: format!(
                            "duplicate record {}.{}",
                            record.owner, record.name
                        ),
                    });
                }
                if records.len() >= config.max_records {
                    return Err(HeapError::CorruptData {
                        detail: format!(
                            "record count exceeds limit {}",
                            config.max_records
                        ),
                    });
                }
                records.push(record);
            }
            other => {
                return Err(HeapError::CorruptData {
                    detail: format!("invalid record marker {other:#04x}"),
                })
            }
        }
    }

    if r.remaining() != 0 {
        return Err(HeapError::CorruptData {
            detail: format!("{} trailing bytes after end marker", r.remaining()),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: u32, name: &str, field_type: FieldType, values: Vec<Value>) -> AllocationRecord {
        AllocationRecord {
            owner: ObjectId(owner),
            name: name.into(),
            field_type,
            values: values.into_iter().collect(),
        }
    }

    #[test]
    fn empty_snapshot_layout() {
        let bytes = encode_snapshot(std::iter::empty());
        assert_eq!(bytes, b"KEEL\x01\x00");
        assert!(decode_snapshot(&bytes, &HeapConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn scalar_record_layout() {
        let r = record(
            2,
            "hp",
            FieldType::Scalar(ValueType::I32),
            vec![Value::I32(-1)],
        );
        let mut buf = Vec::new();
        encode_record(&mut buf, &r);
        assert_eq!(
            buf,
            [
                0x01, // marker
                2, 0, 0, 0, // owner
                2, 0, 0, 0, b'h', b'p', // name
                3,    // i32 tag
                0xff, 0xff, 0xff, 0xff, // -1
            ]
        );
    }

    #[test]
    fn decode_preserves_order_and_values() {
        let records = vec![
            record(
                1,
                "pos",
                FieldType::Array {
                    elem: ValueType::Fixed,
                    len: 2,
                },
                vec![Value::Fixed(Fixed::from_num(3)), Value::Fixed(Fixed::from_num(-2))],
            ),
            record(
                1,
                "owner",
                FieldType::Scalar(ValueType::Ref),
                vec![Value::Ref(Some(ObjectId(9)))],
            ),
            record(2, "alive", FieldType::Scalar(ValueType::Bool), vec![Value::Bool(true)]),
        ];
        let bytes = encode_snapshot(&records);
        let decoded = decode_snapshot(&bytes, &HeapConfig::default()).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].name, "pos");
        assert_eq!(decoded[0].values, records[0].values().to_vec());
        assert_eq!(decoded[1].values, vec![Value::Ref(Some(ObjectId(9)))]);
        assert_eq!(decoded[2].owner, ObjectId(2));
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let r = record(1, "hp", FieldType::Scalar(ValueType::U64), vec![Value::U64(5)]);
        let bytes = encode_snapshot([&r]);
        for cut in 0..bytes.len() {
            let result = decode_snapshot(&bytes[..cut], &HeapConfig::default());
            assert!(
                matches!(result, Err(HeapError::CorruptData { .. })),
                "cut at {cut} should be corrupt"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut bytes = encode_snapshot(std::iter::empty());
        bytes.push(0);
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
    }

    #[test]
    fn bad_magic_and_version() {
        let mut bytes = encode_snapshot(std::iter::empty());
        bytes[0] = b'X';
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
        let mut bytes = encode_snapshot(std::iter::empty());
        bytes[4] = 99;
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
    }

    #[test]
    fn invalid_bool_byte() {
        let r = record(1, "flag", FieldType::Scalar(ValueType::Bool), vec![Value::Bool(true)]);
        let mut bytes = encode_snapshot([&r]);
        let value_pos = bytes.len() - 2;
        bytes[value_pos] = 7;
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
    }

    #[test]
    fn duplicate_records_rejected() {
        let r = record(1, "hp", FieldType::Scalar(ValueType::I32), vec![Value::I32(1)]);
        let bytes = encode_snapshot([&r, &r]);
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
    }

    #[test]
    fn oversized_array_rejected_before_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.push(RECORD_MARKER);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(b'a');
        bytes.push(FieldType::ARRAY_FLAG | ValueType::U8.tag());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_snapshot(&bytes, &HeapConfig::default()),
            Err(HeapError::CorruptData { .. })
        ));
    }
}
