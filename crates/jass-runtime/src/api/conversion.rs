//! Type conversion between Rust and JASS values
//!
//! Provides traits and implementations for bidirectional conversion:
//! - `ToJass` - Convert Rust types to a JASS `Value`
//! - `FromJass` - Convert a JASS `Value` to Rust types
//!
//! # Examples
//!
//! ```
//! use jass_runtime::api::{FromJass, ToJass};
//! use jass_runtime::Value;
//!
//! let value: Value = 42.to_jass();
//! let n: i32 = FromJass::from_jass(&value).unwrap();
//! assert_eq!(n, 42);
//! ```

use crate::api::native::NativeError;
use crate::value::{HandleId, Value};
use thiserror::Error;

/// Error type for value conversion failures
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Type mismatch: expected {expected}, found {found}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl From<ConversionError> for NativeError {
    fn from(err: ConversionError) -> Self {
        NativeError::Message(err.to_string())
    }
}

/// Trait for converting a JASS `Value` to Rust types
pub trait FromJass: Sized {
    /// # Errors
    ///
    /// Returns `ConversionError` if the value has a different tag.
    fn from_jass(value: &Value) -> Result<Self, ConversionError>;
}

/// Trait for converting Rust types to a JASS `Value`
pub trait ToJass {
    fn to_jass(self) -> Value;
}

fn mismatch(expected: &'static str, value: &Value) -> ConversionError {
    ConversionError {
        expected,
        found: value.type_name(),
    }
}

impl FromJass for i32 {
    fn from_jass(value: &Value) -> Result<Self, ConversionError> {
        value.as_integer().ok_or_else(|| mismatch("integer", value))
    }
}

impl ToJass for i32 {
    fn to_jass(self) -> Value {
        Value::Integer(self)
    }
}

// Integers promote to real, matching the arithmetic rules.
impl FromJass for f32 {
    fn from_jass(value: &Value) -> Result<Self, ConversionError> {
        value.as_real().ok_or_else(|| mismatch("real", value))
    }
}

impl ToJass for f32 {
    fn to_jass(self) -> Value {
        Value::Real(self)
    }
}

impl FromJass for bool {
    fn from_jass(value: &Value) -> Result<Self, ConversionError> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl ToJass for bool {
    fn to_jass(self) -> Value {
        Value::Boolean(self)
    }
}

impl FromJass for String {
    fn from_jass(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl ToJass for String {
    fn to_jass(self) -> Value {
        Value::string(self)
    }
}

impl ToJass for &str {
    fn to_jass(self) -> Value {
        Value::string(self)
    }
}

// Handles: `None` is the null handle

impl FromJass for Option<HandleId> {
    fn from_jass(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Handle(handle) => Ok(*handle),
            _ => Err(mismatch("handle", value)),
        }
    }
}

impl ToJass for Option<HandleId> {
    fn to_jass(self) -> Value {
        Value::Handle(self)
    }
}

impl ToJass for HandleId {
    fn to_jass(self) -> Value {
        Value::Handle(Some(self))
    }
}

impl ToJass for () {
    fn to_jass(self) -> Value {
        Value::Nothing
    }
}
