//! Plain-data extraction.
//!
//! A snapshot copies the current field values and record data out of a
//! model. It is detached: later changes to the model do not show up in it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{MemberKind, Model};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub fields: IndexMap<String, Value>,
    pub collections: IndexMap<String, Vec<Value>>,
}

impl ModelSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl Model {
    /// Copy out every field value and the data of every record.
    pub fn snapshot(&self) -> ModelSnapshot {
        let mut snapshot = ModelSnapshot::default();
        for (name, member) in self.inner().registry.members() {
            match member {
                MemberKind::Field(_) => {
                    let value = self.get(&name).unwrap_or(Value::Null);
                    snapshot.fields.insert(name, value);
                }
                MemberKind::Collection(datasource) => {
                    let records = datasource.iter().map(|record| record.data()).collect();
                    snapshot.collections.insert(name, records);
                }
                MemberKind::Behavior(_) => {}
            }
        }
        snapshot
    }
}
