//! Scalar Value Store
//!
//! Current values of a model's scalar fields. A write goes through the
//! field's validator, then its equality contract; only an actual change is
//! stored and published as `updated <name>`.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::field::Field;
use crate::reactive::{Payload, Topic, Verb};

use super::Model;

#[derive(Debug, Default)]
pub(crate) struct ScalarValueStore {
    values: RwLock<HashMap<String, Value>>,
}

impl ScalarValueStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create the slot for a new field. Fields start unset.
    pub(crate) fn insert(&self, name: &str) {
        self.values.write().insert(name.to_string(), Value::Null);
    }

    pub(crate) fn remove(&self, name: &str) {
        self.values.write().remove(name);
    }

    pub(crate) fn read(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// Validate and store `value`. Returns whether the stored value changed.
    pub(crate) fn assign(&self, name: &str, field: &Field, value: Value) -> Result<bool> {
        field
            .validate(&value)
            .map_err(|source| ModelError::validation(name, source))?;

        let mut values = self.values.write();
        let Some(current) = values.get_mut(name) else {
            return Err(ModelError::NotAField {
                name: name.to_string(),
            });
        };
        if field.equals(current, &value) {
            return Ok(false);
        }
        *current = value;
        Ok(true)
    }
}

impl Model {
    /// Current value of the field `name`, `Null` while unset. `None` if
    /// `name` is not a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner().store.read(name)
    }

    /// Assign the field `name`.
    ///
    /// An invalid value fails with [`ModelError::Validation`] and changes
    /// nothing. A value equal to the current one is accepted silently and
    /// returns `Ok(false)`; otherwise the value is stored, `updated <name>`
    /// is published and `Ok(true)` returned.
    pub fn set(&self, name: &str, value: Value) -> Result<bool> {
        let inner = self.inner();
        let field = inner.registry.field(name).ok_or_else(|| ModelError::NotAField {
            name: name.to_string(),
        })?;
        let changed = inner.store.assign(name, &field, value)?;
        if changed {
            self.emit(Topic::new(Verb::Updated, name), Payload::None);
        }
        Ok(changed)
    }
}
