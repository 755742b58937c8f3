//! Field value types, tags, and the [`FieldValue`] trait.
//!
//! Every allocation record in the heap carries a [`FieldType`] that is
//! fixed at registration. Values move in and out of the heap as the
//! type-erased [`Value`] enum; typed field handles convert through
//! [`FieldValue`] so game code never touches `Value` directly.

use std::fmt;

use crate::id::ObjectId;
use crate::math::Fixed;

/// The element type of a field.
///
/// The discriminants are the on-disk type tags and are part of the save
/// format. Do not renumber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Signed 8-bit integer.
    I8 = 1,
    /// Signed 16-bit integer.
    I16 = 2,
    /// Signed 32-bit integer.
    I32 = 3,
    /// Signed 64-bit integer.
    I64 = 4,
    /// Unsigned 8-bit integer (the "byte" type).
    U8 = 5,
    /// Unsigned 16-bit integer.
    U16 = 6,
    /// Unsigned 32-bit integer.
    U32 = 7,
    /// Unsigned 64-bit integer.
    U64 = 8,
    /// [`Fixed`] fixed-point number.
    Fixed = 9,
    /// Boolean.
    Bool = 10,
    /// Optional reference to another heap-backed object.
    Ref = 11,
}

impl ValueType {
    /// All value types, in tag order.
    pub const ALL: [ValueType; 11] = [
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::Fixed,
        Self::Bool,
        Self::Ref,
    ];

    /// The on-disk tag for this type.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a scalar tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// The zero value of this type: `0`, `false`, or a null reference.
    pub fn default_value(self) -> Value {
        match self {
            Self::I8 => Value::I8(0),
            Self::I16 => Value::I16(0),
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::U8 => Value::U8(0),
            Self::U16 => Value::U16(0),
            Self::U32 => Value::U32(0),
            Self::U64 => Value::U64(0),
            Self::Fixed => Value::Fixed(Fixed::ZERO),
            Self::Bool => Value::Bool(false),
            Self::Ref => Value::Ref(None),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Fixed => "fixed",
            Self::Bool => "bool",
            Self::Ref => "ref",
        };
        f.write_str(name)
    }
}

/// Shape and element type of an allocation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A single value.
    Scalar(ValueType),
    /// A fixed-length sequence of same-typed values.
    Array {
        /// Element type.
        elem: ValueType,
        /// Number of elements, fixed at registration.
        len: u32,
    },
}

impl FieldType {
    /// Bit set on the type tag of array records.
    pub const ARRAY_FLAG: u8 = 0x80;

    /// The element type.
    pub fn elem(self) -> ValueType {
        match self {
            Self::Scalar(t) => t,
            Self::Array { elem, .. } => elem,
        }
    }

    /// Number of stored values (1 for scalars).
    pub fn len(self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Array { len, .. } => len as usize,
        }
    }

    /// Whether the record stores no values (zero-length array).
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// The on-disk type tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::Scalar(t) => t.tag(),
            Self::Array { elem, .. } => Self::ARRAY_FLAG | elem.tag(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "{t}"),
            Self::Array { elem, len } => write!(f, "[{elem}; {len}]"),
        }
    }
}

/// A type-erased field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Fixed-point number.
    Fixed(Fixed),
    /// Boolean.
    Bool(bool),
    /// Reference to another object, or null.
    Ref(Option<ObjectId>),
}

impl Value {
    /// The type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::I8(_) => ValueType::I8,
            Self::I16(_) => ValueType::I16,
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::U8(_) => ValueType::U8,
            Self::U16(_) => ValueType::U16,
            Self::U32(_) => ValueType::U32,
            Self::U64(_) => ValueType::U64,
            Self::Fixed(_) => ValueType::Fixed,
            Self::Bool(_) => ValueType::Bool,
            Self::Ref(_) => ValueType::Ref,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Ref(Some(id)) => write!(f, "{id}"),
            Self::Ref(None) => f.write_str("null"),
        }
    }
}

/// A Rust type that can live in a heap field.
///
/// Implemented for the fixed-width integers, `bool`, [`Fixed`], and
/// `Option<ObjectId>` (reference fields). Typed handles use this to
/// convert to and from [`Value`] without exposing the erased form.
pub trait FieldValue: Copy + 'static {
    /// The value type tag stored in the record.
    const TYPE: ValueType;

    /// Wrap into a [`Value`].
    fn into_value(self) -> Value;

    /// Unwrap from a [`Value`]; `None` if the variant does not match.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const TYPE: ValueType = ValueType::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_field_value! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    Fixed => Fixed,
    bool => Bool,
    Option<ObjectId> => Ref,
}
