//! Error types.
//!
//! Structural misuse of derivations (`calc`/`uncalc`) is reported through
//! `bool` return values and never appears here. Everything in this module is
//! a hard failure of the call that produced it; the model instance itself is
//! left unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

/// A candidate value rejected by a field's validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ValidationError {
    pub expected: String,
    pub found: String,
}

impl ValidationError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("name already in use: {name}")]
    NameConflict { name: String },

    #[error("invalid member name: {name:?}")]
    InvalidName { name: String },

    #[error("invalid value for {name}: {source}")]
    Validation {
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error("not a field: {name}")]
    NotAField { name: String },

    #[error("not a behavior: {name}")]
    NotABehavior { name: String },

    #[error("unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("record data must be a JSON object")]
    NotAnObject,

    #[error("duplicate record id: {id}")]
    DuplicateRecord { id: String },

    #[error("record has been removed: {id}")]
    RecordRemoved { id: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}

impl ModelError {
    pub(crate) fn validation(name: impl Into<String>, source: ValidationError) -> Self {
        Self::Validation {
            name: name.into(),
            source,
        }
    }

    /// Whether this error reports a rejected value.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
