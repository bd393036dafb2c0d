//! Type system representation

use crate::value::{Value, ValueArray};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a variable, parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// 32-bit signed integer
    Integer,
    /// 32-bit float
    Real,
    /// Boolean type
    Boolean,
    /// String type
    String,
    /// Reference to a user function
    Code,
    /// Host-owned object, named by its declared handle type (`unit`, `timer`, ...)
    Handle(String),
    /// Array of the element type
    Array(Box<Type>),
    /// Return type of functions that return nothing
    Nothing,
}

impl Type {
    /// Canonical null value used to initialise slots of this type
    pub fn null_value(&self) -> Value {
        match self {
            Type::Integer => Value::Integer(0),
            Type::Real => Value::Real(0.0),
            Type::Boolean => Value::Boolean(false),
            Type::String => Value::string(""),
            Type::Code => Value::Code(None),
            Type::Handle(_) => Value::Handle(None),
            Type::Array(element) => Value::Array(ValueArray::new((**element).clone())),
            Type::Nothing => Value::Nothing,
        }
    }

    /// Element type if this is an array type
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// Arrays of arrays and arrays of `nothing` cannot be declared
    pub fn is_valid_element(&self) -> bool {
        !matches!(self, Type::Array(_) | Type::Nothing)
    }

    /// Convenience constructor for handle types
    pub fn handle(name: impl Into<String>) -> Self {
        Type::Handle(name.into())
    }

    /// Convenience constructor for array types
    pub fn array_of(element: Type) -> Self {
        Type::Array(Box::new(element))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "integer"),
            Type::Real => write!(f, "real"),
            Type::Boolean => write!(f, "boolean"),
            Type::String => write!(f, "string"),
            Type::Code => write!(f, "code"),
            Type::Handle(name) => write!(f, "{}", name),
            Type::Array(element) => write!(f, "{} array", element),
            Type::Nothing => write!(f, "nothing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Type::Integer, Value::Integer(0))]
    #[case(Type::Real, Value::Real(0.0))]
    #[case(Type::Boolean, Value::Boolean(false))]
    #[case(Type::String, Value::string(""))]
    #[case(Type::Code, Value::Code(None))]
    #[case(Type::handle("unit"), Value::Handle(None))]
    #[case(Type::Nothing, Value::Nothing)]
    fn test_null_values(#[case] ty: Type, #[case] expected: Value) {
        assert_eq!(ty.null_value(), expected);
    }

    #[test]
    fn test_array_null_value_is_empty_typed_array() {
        match Type::array_of(Type::Real).null_value() {
            Value::Array(arr) => {
                assert_eq!(arr.element_type(), &Type::Real);
                assert_eq!(arr.get(5).unwrap(), Value::Real(0.0));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array_of(Type::handle("unit")).to_string(), "unit array");
        assert_eq!(Type::Boolean.to_string(), "boolean");
    }

    #[test]
    fn test_valid_elements() {
        assert!(Type::Integer.is_valid_element());
        assert!(!Type::array_of(Type::Integer).is_valid_element());
        assert!(!Type::Nothing.is_valid_element());
    }
}
