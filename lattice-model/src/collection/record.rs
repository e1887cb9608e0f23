//! Records
//!
//! A record is one row of a [`Datasource`](super::Datasource). Besides its
//! declared columns every record carries two reserved attributes, `id` and
//! `state`, readable through [`Record::get`] like any column.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

use super::{CollectionEvent, DatasourceInner};

/// Reserved per-record attribute: the record id.
pub const ID: &str = "id";
/// Reserved per-record attribute: the lifecycle state.
pub const STATE: &str = "state";

/// Attributes every record has regardless of declared columns.
pub const RESERVED_ATTRIBUTES: [&str; 2] = [ID, STATE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Added and not modified since.
    Added,
    /// At least one field changed after the record was added.
    Modified,
    /// Removed from its datasource.
    Removed,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Shared handle to a record. Clones refer to the same row.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

struct RecordInner {
    id: String,
    state: RwLock<RecordState>,
    values: RwLock<Map<String, Value>>,
    source: Weak<DatasourceInner>,
}

impl Record {
    pub(super) fn new(
        id: String,
        values: Map<String, Value>,
        source: Weak<DatasourceInner>,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                id,
                state: RwLock::new(RecordState::Added),
                values: RwLock::new(values),
                source,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> RecordState {
        *self.inner.state.read()
    }

    pub fn is_removed(&self) -> bool {
        self.state() == RecordState::Removed
    }

    /// Read a column or reserved attribute. Unknown names read as `Null`.
    pub fn get(&self, name: &str) -> Value {
        match name {
            ID => Value::String(self.inner.id.clone()),
            STATE => Value::String(self.state().as_str().to_string()),
            _ => self.inner.values.read().get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Assign a column through the datasource's validator.
    ///
    /// Returns `Ok(false)` when the value equals the current one; nothing is
    /// emitted in that case.
    pub fn set(&self, name: &str, value: Value) -> Result<bool> {
        let source = self.attached_source()?;
        let field = source
            .column(name)
            .ok_or_else(|| ModelError::UnknownColumn {
                column: name.to_string(),
            })?
            .clone();
        field
            .validate(&value)
            .map_err(|source| ModelError::validation(name, source))?;

        {
            let mut values = self.inner.values.write();
            if field.equals(values.get(name).unwrap_or(&Value::Null), &value) {
                return Ok(false);
            }
            values.insert(name.to_string(), value);
        }
        self.mark_modified();
        source.emit(&CollectionEvent::Updated {
            record: self.clone(),
            field: name.to_string(),
        });
        Ok(true)
    }

    /// Store a computed value without validation or equality check and
    /// emit the datasource's updated event. Writes to removed records are
    /// dropped.
    pub(crate) fn set_computed(&self, name: &str, value: Value) {
        let Ok(source) = self.attached_source() else {
            return;
        };
        self.inner.values.write().insert(name.to_string(), value);
        self.mark_modified();
        source.emit(&CollectionEvent::Updated {
            record: self.clone(),
            field: name.to_string(),
        });
    }

    /// Plain data view: declared columns plus `id`.
    pub fn data(&self) -> Value {
        let mut data = self.inner.values.read().clone();
        data.insert(ID.to_string(), Value::String(self.inner.id.clone()));
        Value::Object(data)
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(super) fn mark_removed(&self) {
        *self.inner.state.write() = RecordState::Removed;
    }

    fn mark_modified(&self) {
        let mut state = self.inner.state.write();
        if *state == RecordState::Added {
            *state = RecordState::Modified;
        }
    }

    fn attached_source(&self) -> Result<Arc<DatasourceInner>> {
        match self.inner.source.upgrade() {
            Some(source) if !self.is_removed() => Ok(source),
            _ => Err(ModelError::RecordRemoved {
                id: self.inner.id.clone(),
            }),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}
