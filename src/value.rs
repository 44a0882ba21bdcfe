//! The closed value union stored in property cells.
//!
//! Records are type-erased behind [`Value`], a closed tagged union over
//! the kinds game state actually uses: integers, floats, booleans,
//! strings and 2D vectors. Arithmetic and comparison are defined per
//! variant pair with explicit rules; there is no implicit coercion
//! beyond int → float promotion in mixed numeric expressions.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The runtime type tag of a [`Value`], fixed per record at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Str,
    Vec2,
}

impl ValueKind {
    /// The kind's zero value, used to seed records declared without a
    /// default.
    pub fn zero(self) -> Value {
        match self {
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::Vec2 => Value::Vec2(Vec2::ZERO),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "str",
            ValueKind::Vec2 => "vec2",
        };
        write!(f, "{}", name)
    }
}

/// A dynamically typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Vec2(Vec2),
}

/// Binary combinators available on records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Subtract => "subtract",
            ArithOp::Multiply => "multiply",
            ArithOp::Divide => "divide",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Key-free failure of a value-level operation. The record layer wraps
/// these into [`crate::PropertyError`] with the offending key attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueOpError {
    KindMismatch { expected: ValueKind, got: ValueKind },
    NoRule { op: &'static str, kind: ValueKind },
    DivisionByZero,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::Vec2(_) => ValueKind::Vec2,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: ints promote to float, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Vector view. Scalars splat into both components, the way the
    /// engine expects when a tunable drives a 2D quantity.
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Value::Vec2(v) => Some(*v),
            Value::Float(f) => Some(Vec2::splat(*f as f32)),
            Value::Int(i) => Some(Vec2::splat(*i as f32)),
            _ => None,
        }
    }

    /// The value's natural display form, without any format spec applied.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }

    /// Apply a binary combinator. Rules are explicit per variant pair:
    ///
    /// - numeric op numeric: int stays int, mixed promotes to float
    /// - str add anything: concatenation of the display forms
    /// - vec2 op vec2: componentwise
    /// - vec2 op scalar: the scalar splats
    /// - bool: no arithmetic
    ///
    /// Integer division by zero is an error; float and vector division
    /// keep IEEE semantics.
    pub(crate) fn combine(&self, op: ArithOp, rhs: &Value) -> Result<Value, ValueOpError> {
        use Value::*;
        match (self, rhs) {
            (Int(a), Int(b)) => {
                if op == ArithOp::Divide && *b == 0 {
                    return Err(ValueOpError::DivisionByZero);
                }
                Ok(Int(int_op(op, *a, *b)))
            }
            (Int(a), Float(b)) => Ok(Float(float_op(op, *a as f64, *b))),
            (Float(a), Int(b)) => Ok(Float(float_op(op, *a, *b as f64))),
            (Float(a), Float(b)) => Ok(Float(float_op(op, *a, *b))),
            (Str(a), _) if op == ArithOp::Add => {
                let mut out = a.clone();
                out.push_str(&rhs.to_display_string());
                Ok(Str(out))
            }
            (Str(_), _) => Err(ValueOpError::NoRule {
                op: op.name(),
                kind: ValueKind::Str,
            }),
            (Bool(_), _) => Err(ValueOpError::NoRule {
                op: op.name(),
                kind: ValueKind::Bool,
            }),
            (Vec2(a), Vec2(b)) => Ok(Vec2(vec_op(op, *a, *b))),
            (Vec2(a), Int(s)) => Ok(Vec2(vec_op(op, *a, glam::Vec2::splat(*s as f32)))),
            (Vec2(a), Float(s)) => Ok(Vec2(vec_op(op, *a, glam::Vec2::splat(*s as f32)))),
            (Vec2(_), _) => Err(ValueOpError::KindMismatch {
                expected: ValueKind::Vec2,
                got: rhs.kind(),
            }),
            _ => Err(ValueOpError::KindMismatch {
                expected: self.kind(),
                got: rhs.kind(),
            }),
        }
    }

    /// Ordering against another value of a comparable kind.
    pub(crate) fn compare(&self, rhs: &Value) -> Result<Ordering, ValueOpError> {
        use Value::*;
        match (self, rhs) {
            (Int(a), Int(b)) => Ok(a.cmp(b)),
            (Bool(a), Bool(b)) => Ok(a.cmp(b)),
            (Str(a), Str(b)) => Ok(a.cmp(b)),
            (Int(a), Float(b)) => cmp_f64(*a as f64, *b),
            (Float(a), Int(b)) => cmp_f64(*a, *b as f64),
            (Float(a), Float(b)) => cmp_f64(*a, *b),
            (Vec2(_), _) => Err(ValueOpError::NoRule {
                op: "compare",
                kind: ValueKind::Vec2,
            }),
            _ => Err(ValueOpError::KindMismatch {
                expected: self.kind(),
                got: rhs.kind(),
            }),
        }
    }

    /// Unary negation for numeric and vector kinds.
    pub(crate) fn negated(&self) -> Result<Value, ValueOpError> {
        match self {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Vec2(v) => Ok(Value::Vec2(-*v)),
            other => Err(ValueOpError::NoRule {
                op: "negate",
                kind: other.kind(),
            }),
        }
    }

    /// Unary boolean toggle.
    pub(crate) fn toggled(&self) -> Result<Value, ValueOpError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(ValueOpError::NoRule {
                op: "toggle",
                kind: other.kind(),
            }),
        }
    }
}

/// NaN operands are incomparable.
fn cmp_f64(a: f64, b: f64) -> Result<Ordering, ValueOpError> {
    a.partial_cmp(&b).ok_or(ValueOpError::NoRule {
        op: "compare",
        kind: ValueKind::Float,
    })
}

fn int_op(op: ArithOp, a: i64, b: i64) -> i64 {
    match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Subtract => a.wrapping_sub(b),
        ArithOp::Multiply => a.wrapping_mul(b),
        ArithOp::Divide => a.wrapping_div(b),
    }
}

fn float_op(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Subtract => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide => a / b,
    }
}

fn vec_op(op: ArithOp, a: Vec2, b: Vec2) -> Vec2 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Subtract => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide => a / b,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vec2(v)
    }
}

/// A Rust type with a 1:1 mapping onto one [`Value`] variant.
///
/// Implemented for the closed set `i64`, `f64`, `bool`, `String` and
/// [`glam::Vec2`]; typed handles ([`crate::Property`]) are parameterized
/// over this trait.
pub trait PropertyValue: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Option<Self>;

    fn from_value_ref(value: &Value) -> Option<Self> {
        Self::from_value(value.clone())
    }
}

impl PropertyValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl PropertyValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl PropertyValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl PropertyValue for String {
    const KIND: ValueKind = ValueKind::Str;

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PropertyValue for Vec2 {
    const KIND: ValueKind = ValueKind::Vec2;

    fn into_value(self) -> Value {
        Value::Vec2(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Vec2(v) => Some(v),
            _ => None,
        }
    }
}
