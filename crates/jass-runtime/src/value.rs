//! Runtime value representation
//!
//! Shared value representation for the compiler (literals) and the VM.
//! - Integer, Real, Boolean: Immediate values
//! - Strings: Heap-allocated, reference-counted (`Arc<str>`), immutable
//! - Code: Reference to a compiled user function, or null
//! - Handle: Opaque id of a host-owned object, or null
//! - Arrays: Copy-on-write storage of an array slot (not a first-class script value)
//! - Nothing: The value returned by functions declared `returns nothing`
//!
//! Arithmetic and comparison dispatch on the tag pair at runtime; the
//! promotion rules live in [`arithmetic`].

use crate::api::native::NativeError;
use crate::ast::ArithmeticSign;
use crate::symbol::FunctionId;
use crate::types::Type;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Logical capacity of every script array. Indices outside `0..JASS_MAX_ARRAY_SIZE`
/// are out of bounds.
pub const JASS_MAX_ARRAY_SIZE: usize = 8192;

/// Opaque id of a host-owned object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

/// Reference to a compiled user function (the payload of `code` values)
#[derive(Debug, Clone)]
pub struct FunctionRef {
    /// Function id in the global scope
    pub id: FunctionId,
    /// Function name
    pub name: Arc<str>,
    /// Entry address
    pub entry: usize,
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Copy-on-write array storage. Cheap to clone (refcount bump).
/// Mutations on a shared array clone the inner Vec first (Arc::make_mut).
///
/// Only the written prefix is materialised; any in-range index past it
/// reads as the element type's null value.
#[derive(Clone, Debug)]
pub struct ValueArray {
    elements: Arc<Vec<Value>>,
    element_type: Type,
}

impl ValueArray {
    pub fn new(element_type: Type) -> Self {
        ValueArray {
            elements: Arc::new(Vec::new()),
            element_type,
        }
    }

    pub fn element_type(&self) -> &Type {
        &self.element_type
    }

    /// Number of materialised elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bounds-checked read
    pub fn get(&self, index: i32) -> Result<Value, RuntimeError> {
        let index = checked_index(index)?;
        Ok(self
            .elements
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.element_type.null_value()))
    }

    /// Bounds-checked write; copies the storage first if it is shared.
    pub fn set(&mut self, index: i32, value: Value) -> Result<(), RuntimeError> {
        let index = checked_index(index)?;
        let inner = Arc::make_mut(&mut self.elements);
        if index >= inner.len() {
            let null = self.element_type.null_value();
            inner.resize(index + 1, null);
        }
        inner[index] = value;
        Ok(())
    }

    /// Returns true if this array is the sole owner (no other clones).
    pub fn is_exclusively_owned(&self) -> bool {
        Arc::strong_count(&self.elements) == 1
    }
}

fn checked_index(index: i32) -> Result<usize, RuntimeError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < JASS_MAX_ARRAY_SIZE)
        .ok_or(RuntimeError::IndexOutOfBounds {
            index,
            len: JASS_MAX_ARRAY_SIZE,
        })
}

impl PartialEq for ValueArray {
    fn eq(&self, other: &Self) -> bool {
        if self.element_type != other.element_type {
            return false;
        }
        let extent = self.len().max(other.len());
        (0..extent as i32).all(|i| self.get(i).ok() == other.get(i).ok())
    }
}

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer (wrapping arithmetic)
    Integer(i32),
    /// 32-bit float
    Real(f32),
    /// Boolean value
    Boolean(bool),
    /// String value (reference-counted, immutable)
    String(Arc<str>),
    /// Function reference; `None` is the null code value
    Code(Option<FunctionRef>),
    /// Host object handle; `None` is the null handle (and the `null` literal)
    Handle(Option<HandleId>),
    /// Array slot storage
    Array(ValueArray),
    /// Sentinel left by calls to functions that return nothing
    Nothing,
}

impl Value {
    /// Create a new string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Code(_) => "code",
            Value::Handle(_) => "handle",
            Value::Array(_) => "array",
            Value::Nothing => "nothing",
        }
    }

    /// Null-like values compare equal to the `null` literal
    pub fn is_null(&self) -> bool {
        match self {
            Value::Code(code) => code.is_none(),
            Value::Handle(handle) => handle.is_none(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::Code(Some(func)) => write!(f, "function {}", func.name),
            Value::Handle(Some(handle)) => write!(f, "handle#{}", handle.0),
            Value::Code(None) | Value::Handle(None) => write!(f, "null"),
            Value::Array(arr) => write!(f, "<{} array>", arr.element_type()),
            Value::Nothing => write!(f, "nothing"),
        }
    }
}

/// Runtime error type
///
/// Every runtime error is fatal to the invocation that raised it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Operator applied to incompatible tags
    #[error("Type error: cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    /// Unary operator or branch condition of the wrong tag
    #[error("Type error: '{op}' expects {expected}, got {found}")]
    UnexpectedType {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    /// Division by zero
    #[error("Division by zero")]
    DivideByZero,
    /// Array index out of bounds
    #[error("Array index {index} out of bounds (size {len})")]
    IndexOutOfBounds { index: i32, len: usize },
    /// Call-stack exhaustion (unbounded recursion)
    #[error("Call stack overflow: depth limit {limit} exceeded")]
    CallStackOverflow { limit: usize },
    /// Operand stack exhaustion
    #[error("Operand stack overflow: limit {limit} exceeded")]
    OperandStackOverflow { limit: usize },
    /// Pop from an empty operand stack
    #[error("Operand stack underflow at instruction {ip}")]
    StackUnderflow { ip: usize },
    /// Return-family instruction with no enclosing frame
    #[error("Return at instruction {ip} with no enclosing frame")]
    ReturnWithoutFrame { ip: usize },
    /// set-return-addr or native without a preceding new-stack-frame
    #[error("No frame under construction at instruction {ip}")]
    NoPendingFrame { ip: usize },
    /// Native invoked on a user frame, or return on a native frame
    #[error("Frame kind mismatch at instruction {ip}")]
    FrameMismatch { ip: usize },
    /// Branch or return target outside the instruction array
    #[error("Invalid branch target {target}")]
    InvalidBranchTarget { target: usize },
    /// Slot id not present in the active frame or global storage
    #[error("Invalid slot {slot}")]
    InvalidSlot { slot: usize },
    /// A reserved placeholder was executed
    #[error("Unresolved instruction at {ip}")]
    UnresolvedInstruction { ip: usize },
    /// Native id missing from the host dispatch table
    #[error("Unknown native id {id}")]
    UnknownNative { id: u32 },
    /// Host native reported a failure
    #[error("Native '{name}' failed: {source}")]
    Native {
        name: String,
        #[source]
        source: NativeError,
    },
    /// Wrong number of arguments for a top-level invocation
    #[error("Function '{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// Entry address or name that is not a compiled function
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },
    /// Instruction budget exhausted
    #[error("Instruction limit of {limit} exceeded")]
    InstructionLimit { limit: u64 },
    /// resume() on a VM that is not suspended
    #[error("VM is not suspended")]
    NotSuspended,
    /// start() on a VM that holds a suspended invocation
    #[error("VM already holds a suspended invocation")]
    AlreadyRunning,
}

/// Operands after numeric promotion
enum Numeric {
    Int(i32, i32),
    Real(f32, f32),
}

fn promote(left: &Value, right: &Value) -> Option<Numeric> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Numeric::Int(*a, *b)),
        (Value::Integer(a), Value::Real(b)) => Some(Numeric::Real(*a as f32, *b)),
        (Value::Real(a), Value::Integer(b)) => Some(Numeric::Real(*a, *b as f32)),
        (Value::Real(a), Value::Real(b)) => Some(Numeric::Real(*a, *b)),
        _ => None,
    }
}

fn mismatch(sign: ArithmeticSign, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        op: sign.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

/// Apply a binary operator with the promotion rules:
/// integer∘integer → integer, any integer/real mix → real,
/// string + string → concatenation.
pub fn arithmetic(sign: ArithmeticSign, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    use ArithmeticSign::*;

    match sign {
        Equal => values_equal(left, right).map(Value::Boolean),
        NotEqual => values_equal(left, right).map(|eq| Value::Boolean(!eq)),
        Less | LessEqual | Greater | GreaterEqual => {
            let ordering = match promote(left, right) {
                Some(Numeric::Int(a, b)) => a.partial_cmp(&b),
                Some(Numeric::Real(a, b)) => a.partial_cmp(&b),
                None => return Err(mismatch(sign, left, right)),
            };
            let result = match ordering {
                Some(ordering) => match sign {
                    Less => ordering.is_lt(),
                    LessEqual => ordering.is_le(),
                    Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                },
                // NaN compares false
                None => false,
            };
            Ok(Value::Boolean(result))
        }
        Add | Subtract | Multiply | Divide => {
            if let (Add, Value::String(a), Value::String(b)) = (sign, left, right) {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                return Ok(Value::string(joined));
            }
            match promote(left, right) {
                Some(Numeric::Int(a, b)) => integer_op(sign, a, b),
                Some(Numeric::Real(a, b)) => real_op(sign, a, b),
                None => Err(mismatch(sign, left, right)),
            }
        }
    }
}

fn integer_op(sign: ArithmeticSign, a: i32, b: i32) -> Result<Value, RuntimeError> {
    let result = match sign {
        ArithmeticSign::Add => a.wrapping_add(b),
        ArithmeticSign::Subtract => a.wrapping_sub(b),
        ArithmeticSign::Multiply => a.wrapping_mul(b),
        _ => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            a.wrapping_div(b)
        }
    };
    Ok(Value::Integer(result))
}

fn real_op(sign: ArithmeticSign, a: f32, b: f32) -> Result<Value, RuntimeError> {
    let result = match sign {
        ArithmeticSign::Add => a + b,
        ArithmeticSign::Subtract => a - b,
        ArithmeticSign::Multiply => a * b,
        _ => {
            if b == 0.0 {
                return Err(RuntimeError::DivideByZero);
            }
            a / b
        }
    };
    Ok(Value::Real(result))
}

/// Equality across tags: same-tag pairs, promoted integer/real pairs, and the
/// `null` literal against any null-like value.
pub fn values_equal(left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
        (Value::Integer(_), Value::Real(_)) | (Value::Real(_), Value::Integer(_)) => {
            match promote(left, right) {
                Some(Numeric::Real(a, b)) => Ok(a == b),
                _ => Ok(false),
            }
        }
        (Value::Real(a), Value::Real(b)) => Ok(a == b),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (Value::Code(a), Value::Code(b)) => Ok(a == b),
        (Value::Handle(a), Value::Handle(b)) => Ok(a == b),
        (Value::Nothing, Value::Nothing) => Ok(true),
        (Value::Handle(None), other) | (other, Value::Handle(None)) => Ok(other.is_null()),
        _ => Err(mismatch(ArithmeticSign::Equal, left, right)),
    }
}

/// Widen an integer stored into a `real` slot; other values pass through
pub fn widen_to_real(value: Value) -> Value {
    match value {
        Value::Integer(i) => Value::Real(i as f32),
        other => other,
    }
}

/// Unary minus
pub fn negate(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
        Value::Real(r) => Ok(Value::Real(-r)),
        other => Err(RuntimeError::UnexpectedType {
            op: "-",
            expected: "integer or real",
            found: other.type_name(),
        }),
    }
}

/// Boolean `not`
pub fn not(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Boolean(b) => Ok(Value::Boolean(!b)),
        other => Err(RuntimeError::UnexpectedType {
            op: "not",
            expected: "boolean",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ArithmeticSign::Add, Value::Integer(2), Value::Integer(3), Value::Integer(5))]
    #[case(ArithmeticSign::Subtract, Value::Integer(2), Value::Integer(3), Value::Integer(-1))]
    #[case(ArithmeticSign::Multiply, Value::Integer(4), Value::Integer(3), Value::Integer(12))]
    #[case(ArithmeticSign::Divide, Value::Integer(7), Value::Integer(2), Value::Integer(3))]
    #[case(ArithmeticSign::Divide, Value::Integer(-7), Value::Integer(2), Value::Integer(-3))]
    #[case(ArithmeticSign::Add, Value::Integer(1), Value::Real(0.5), Value::Real(1.5))]
    #[case(ArithmeticSign::Multiply, Value::Real(0.5), Value::Integer(4), Value::Real(2.0))]
    #[case(ArithmeticSign::Divide, Value::Integer(1), Value::Real(4.0), Value::Real(0.25))]
    #[case(ArithmeticSign::Add, Value::string("ab"), Value::string("cd"), Value::string("abcd"))]
    fn test_arithmetic_promotion(
        #[case] sign: ArithmeticSign,
        #[case] left: Value,
        #[case] right: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(arithmetic(sign, &left, &right).unwrap(), expected);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let result = arithmetic(
            ArithmeticSign::Add,
            &Value::Integer(i32::MAX),
            &Value::Integer(1),
        );
        assert_eq!(result.unwrap(), Value::Integer(i32::MIN));
    }

    #[rstest]
    #[case(Value::Integer(1), Value::Integer(0))]
    #[case(Value::Real(1.0), Value::Real(0.0))]
    #[case(Value::Integer(1), Value::Real(0.0))]
    fn test_divide_by_zero(#[case] left: Value, #[case] right: Value) {
        assert_eq!(
            arithmetic(ArithmeticSign::Divide, &left, &right),
            Err(RuntimeError::DivideByZero)
        );
    }

    #[test]
    fn test_incompatible_tags() {
        let err = arithmetic(
            ArithmeticSign::Subtract,
            &Value::string("a"),
            &Value::Integer(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                op: "-",
                left: "string",
                right: "integer"
            }
        );
    }

    #[test]
    fn test_mixed_comparison() {
        let lt = arithmetic(ArithmeticSign::Less, &Value::Integer(1), &Value::Real(1.5));
        assert_eq!(lt.unwrap(), Value::Boolean(true));
        let eq = arithmetic(ArithmeticSign::Equal, &Value::Integer(2), &Value::Real(2.0));
        assert_eq!(eq.unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_null_literal_equality() {
        let null = Value::Handle(None);
        assert_eq!(values_equal(&null, &Value::Code(None)), Ok(true));
        assert_eq!(values_equal(&Value::string(""), &null), Ok(true));
        assert_eq!(values_equal(&Value::Handle(Some(HandleId(3))), &null), Ok(false));
        assert_eq!(values_equal(&null, &Value::Integer(0)), Ok(false));
    }

    #[test]
    fn test_unary_ops() {
        assert_eq!(negate(&Value::Integer(5)), Ok(Value::Integer(-5)));
        assert_eq!(negate(&Value::Real(1.5)), Ok(Value::Real(-1.5)));
        assert!(negate(&Value::Boolean(true)).is_err());
        assert_eq!(not(&Value::Boolean(true)), Ok(Value::Boolean(false)));
        assert!(not(&Value::Integer(0)).is_err());
    }

    #[test]
    fn test_array_bounds_and_defaults() {
        let mut arr = ValueArray::new(Type::Integer);
        assert_eq!(arr.get(100).unwrap(), Value::Integer(0));
        arr.set(3, Value::Integer(9)).unwrap();
        assert_eq!(arr.get(3).unwrap(), Value::Integer(9));
        assert_eq!(arr.get(2).unwrap(), Value::Integer(0));
        assert_eq!(arr.len(), 4);

        assert!(matches!(
            arr.get(-1),
            Err(RuntimeError::IndexOutOfBounds { index: -1, .. })
        ));
        assert!(arr.set(JASS_MAX_ARRAY_SIZE as i32, Value::Integer(1)).is_err());
        assert!(arr.get(JASS_MAX_ARRAY_SIZE as i32 - 1).is_ok());
    }

    #[test]
    fn test_array_copy_on_write() {
        let mut original = ValueArray::new(Type::String);
        original.set(0, Value::string("a")).unwrap();
        let snapshot = original.clone();
        assert!(!original.is_exclusively_owned());

        original.set(0, Value::string("b")).unwrap();
        assert_eq!(snapshot.get(0).unwrap(), Value::string("a"));
        assert_eq!(original.get(0).unwrap(), Value::string("b"));
    }

    #[rstest]
    #[case(Value::Integer(3), Value::Real(3.0))]
    #[case(Value::Real(0.5), Value::Real(0.5))]
    #[case(Value::Nothing, Value::Nothing)]
    fn test_widen_to_real(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(widen_to_real(input), expected);
    }
}
