//! Field descriptors.
//!
//! A descriptor decides which values a scalar field (or a collection column)
//! accepts and when two values count as equal. Equality matters: an equal
//! write is silent, which is what stops derived fields from recomputing
//! forever when a formula settles on the same value.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ValidationError;

/// Validation and equality contract of a field.
pub trait FieldType: Send + Sync {
    /// Check a candidate value before it is stored.
    fn validate(&self, candidate: &Value) -> Result<(), ValidationError>;

    /// Whether storing `b` over `a` is a change.
    fn equals(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
}

/// Built-in descriptors. `Null` is accepted by every kind and means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Any,
    Text,
    Number,
    Boolean,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Any => "any value",
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integers compare exactly; `f64` is only used when a float is involved,
/// so 1 and 1.0 are the same number but 2^53 and 2^53 + 1 are not.
fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x == y;
    }
    if x.is_f64() || y.is_f64() {
        if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
            return x == y;
        }
    }
    // one negative i64, one u64 above i64::MAX
    false
}

impl FieldType for FieldKind {
    fn validate(&self, candidate: &Value) -> Result<(), ValidationError> {
        let ok = match (self, candidate) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::Text, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::new(self.expected(), describe(candidate)))
        }
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
            _ => a == b,
        }
    }
}

/// Shared handle to a field descriptor.
#[derive(Clone)]
pub struct Field(Arc<dyn FieldType>);

impl Field {
    pub fn new(field_type: impl FieldType + 'static) -> Self {
        Self(Arc::new(field_type))
    }

    /// Accepts every value.
    pub fn any() -> Self {
        Self::new(FieldKind::Any)
    }

    /// Accepts strings.
    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    /// Accepts numbers, compared numerically.
    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    /// Accepts `true` and `false`.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// Check `candidate` against the wrapped descriptor.
    pub fn validate(&self, candidate: &Value) -> Result<(), ValidationError> {
        self.0.validate(candidate)
    }

    /// Whether writing `b` over `a` would be a no-op.
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.0.equals(a, b)
    }
}

impl From<FieldKind> for Field {
    fn from(kind: FieldKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").finish_non_exhaustive()
    }
}
