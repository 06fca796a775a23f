//! Scalar transport values and the checked coercions applied to them.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DbError, Result};

/// Scalar value as delivered by the driver boundary, tagged so the serialized
/// form stays unambiguous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any integer column, widened to 64 bits.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// Binary payload.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// Type descriptor handed to the driver boundary in place of a runtime class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// 16-bit integer.
    Short,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// 64-bit float.
    Float,
    /// Text.
    Text,
    /// Binary.
    Bytes,
    /// No particular kind; the raw value is passed through.
    Any,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Any => "any",
        };
        f.write_str(name)
    }
}

/// Primitive element kind delivered as a flat array by the driver boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// 16-bit integers.
    Short,
    /// 32-bit integers.
    Int,
    /// 64-bit integers.
    Long,
}

impl PrimitiveKind {
    /// Matching scalar descriptor.
    pub const fn value_kind(self) -> ValueKind {
        match self {
            PrimitiveKind::Short => ValueKind::Short,
            PrimitiveKind::Int => ValueKind::Int,
            PrimitiveKind::Long => ValueKind::Long,
        }
    }
}

/// Checked conversion from a raw [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Descriptor announced to the driver boundary.
    const KIND: ValueKind;

    /// Converts the raw value, failing with [`DbError::TypeMismatch`] when the
    /// value cannot represent `Self`.
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(DbError::mismatch(Self::KIND, &other)),
        }
    }
}

fn coerce_i64(value: Value, expected: ValueKind) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(i),
        Value::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Ok(f as i64)
        }
        Value::String(ref s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(i),
            Err(err) => Err(DbError::mismatch_with(expected, &value, err)),
        },
        other => Err(DbError::mismatch(expected, &other)),
    }
}

macro_rules! narrow_int_from_value {
    ($ty:ty, $kind:expr) => {
        impl FromValue for $ty {
            const KIND: ValueKind = $kind;

            fn from_value(value: Value) -> Result<Self> {
                let found = value.kind_name();
                let wide = coerce_i64(value, Self::KIND)?;
                <$ty>::try_from(wide).map_err(|_| DbError::TypeMismatch {
                    expected: Self::KIND,
                    found,
                    detail: format!(": {wide} out of range"),
                })
            }
        }
    };
}

narrow_int_from_value!(i16, ValueKind::Short);
narrow_int_from_value!(i32, ValueKind::Int);

impl FromValue for i64 {
    const KIND: ValueKind = ValueKind::Long;

    fn from_value(value: Value) -> Result<Self> {
        coerce_i64(value, Self::KIND)
    }
}

impl FromValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::String(ref s) => match s.trim().parse::<f64>() {
                Ok(f) => Ok(f),
                Err(err) => Err(DbError::mismatch_with(Self::KIND, &value, err)),
            },
            other => Err(DbError::mismatch(Self::KIND, &other)),
        }
    }
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(DbError::mismatch(Self::KIND, &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(DbError::mismatch(Self::KIND, &other)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_is_range_checked() {
        assert_eq!(i16::from_value(Value::Int(12)).unwrap(), 12);
        let err = i16::from_value(Value::Int(70_000)).unwrap_err();
        assert!(matches!(
            err,
            DbError::TypeMismatch {
                expected: ValueKind::Short,
                ..
            }
        ));
    }

    #[test]
    fn strings_parse_into_numbers_when_possible() {
        assert_eq!(i64::from_value(Value::from(" 42 ")).unwrap(), 42);
        assert_eq!(f64::from_value(Value::from("2.5")).unwrap(), 2.5);
        assert!(matches!(
            i32::from_value(Value::from("forty-two")),
            Err(DbError::TypeMismatch { found: "string", .. })
        ));
    }

    #[test]
    fn null_only_fits_optional_targets() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Int(3)).unwrap(), Some(3));
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn value_serializes_with_explicit_tag() {
        let json = serde_json::to_string(&Value::Int(7)).unwrap();
        assert_eq!(json, r#"{"t":"Int","v":7}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int(7));
    }
}
