//! Declarative model schemas.
//!
//! A schema lists a model's fields and collections so a model can be built
//! from configuration instead of code. Behaviors and derivations carry code
//! and are attached after [`ModelSchema::build`].
//!
//! ```json
//! {
//!   "members": {
//!     "counter": { "type": "field", "kind": "number" },
//!     "company": {
//!       "type": "collection",
//!       "columns": { "name": "text", "employeeCount": "number" }
//!     }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::collection::Datasource;
use crate::error::Result;
use crate::field::FieldKind;
use crate::model::{MemberKind, Model};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MemberSchema {
    Field {
        #[serde(default)]
        kind: FieldKind,
    },
    Collection {
        #[serde(default)]
        columns: IndexMap<String, FieldKind>,
    },
}

impl MemberSchema {
    fn instantiate(&self) -> MemberKind {
        match self {
            Self::Field { kind } => MemberKind::from(*kind),
            Self::Collection { columns } => {
                let columns = columns.iter().map(|(name, kind)| (name.clone(), *kind));
                MemberKind::from(Datasource::new(columns))
            }
        }
    }
}

/// Ordered member declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    #[serde(default)]
    pub members: IndexMap<String, MemberSchema>,
}

impl ModelSchema {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Build a new model with every declared member.
    pub fn build(&self) -> Result<Model> {
        let model = Model::new();
        self.apply(&model)?;
        Ok(model)
    }

    /// Add every declared member to an existing model, in order. Stops at
    /// the first member that cannot be added.
    pub fn apply(&self, model: &Model) -> Result<()> {
        for (name, member) in &self.members {
            model.extend(name, member.instantiate())?;
        }
        tracing::debug!(members = self.members.len(), "schema applied");
        Ok(())
    }
}
