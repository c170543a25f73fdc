use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::types::PgNumeric;

/// Built-in value shapes understood by the codec registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I16,
    I32,
    I64,
    U32,
    F32,
    F64,
    Numeric,
    String,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Enum,
    Array,
    List,
    Custom,
}

/// Key under which a codec is registered.
///
/// Built-in values are keyed by their [`ValueKind`], enums and custom values by their type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Builtin(ValueKind),
    Named(Cow<'static, str>),
}

impl TypeKey {
    pub fn named(name: impl Into<Cow<'static, str>>) -> TypeKey {
        TypeKey::Named(name.into())
    }
}

impl From<ValueKind> for TypeKey {
    fn from(kind: ValueKind) -> Self {
        TypeKey::Builtin(kind)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Builtin(kind) => write!(f, "{kind:?}"),
            TypeKey::Named(name) => f.write_str(name),
        }
    }
}

/// A value of an application defined type.
///
/// Custom values are resolved by exact type name first, then through [`CustomValue::as_primitive`],
/// then through [`CustomValue::supertypes`], and finally rendered with [`fmt::Display`].
pub trait CustomValue: fmt::Debug + fmt::Display + Send + Sync {
    /// Name under which codecs for this type are registered.
    fn type_name(&self) -> Cow<'static, str>;

    /// Names of the types this one specializes, nearest first.
    fn supertypes(&self) -> Vec<Cow<'static, str>> {
        Vec::new()
    }

    /// Built-in value this type wraps, if it is a thin wrapper around one.
    fn as_primitive(&self) -> Option<Value> {
        None
    }
}

/// Implemented by Rust enums stored in Postgres enum columns.
pub trait EnumMember {
    /// Name of the enum type.
    const TYPE_NAME: &'static str;

    /// Name of the member, as declared in the database enum.
    fn member_name(&self) -> &'static str;
}

/// A value extracted from an entity column.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U32(u32),
    F32(f32),
    F64(f64),
    Numeric(PgNumeric),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Enum {
        type_name: Cow<'static, str>,
        member: Cow<'static, str>,
    },
    /// A fixed size array.
    Array(Vec<Value>),
    /// An ordered collection.
    List(Vec<Value>),
    Custom(Arc<dyn CustomValue>),
}

impl Value {
    /// Creates an enum value from a type implementing [`EnumMember`].
    pub fn from_enum<E: EnumMember>(member: &E) -> Value {
        Value::Enum {
            type_name: Cow::Borrowed(E::TYPE_NAME),
            member: Cow::Borrowed(member.member_name()),
        }
    }

    /// Creates an array value from anything convertible into values.
    pub fn array<I, V>(elements: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(elements.into_iter().map(Into::into).collect())
    }

    /// Creates a list value from anything convertible into values.
    pub fn list<I, V>(elements: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(elements.into_iter().map(Into::into).collect())
    }

    /// Wraps an application defined value.
    pub fn custom<C: CustomValue + 'static>(value: C) -> Value {
        Value::Custom(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the built-in shape of this value, `None` for [`Value::Null`].
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U32(_) => ValueKind::U32,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Numeric(_) => ValueKind::Numeric,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::TimestampTz(_) => ValueKind::TimestampTz,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Json(_) => ValueKind::Json,
            Value::Enum { .. } => ValueKind::Enum,
            Value::Array(_) => ValueKind::Array,
            Value::List(_) => ValueKind::List,
            Value::Custom(_) => ValueKind::Custom,
        };

        Some(kind)
    }

    /// Returns the exact key codecs are looked up with, `None` for [`Value::Null`].
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Value::Enum { type_name, .. } => Some(TypeKey::Named(type_name.clone())),
            Value::Custom(custom) => Some(TypeKey::Named(custom.type_name())),
            other => other.kind().map(TypeKey::Builtin),
        }
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    f32 => F32,
    f64 => F64,
    PgNumeric => Numeric,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<FixedOffset> => TimestampTz,
    Uuid => Uuid,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Numeric(PgNumeric::Value(value))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::TimestampTz(value.fixed_offset())
    }
}
