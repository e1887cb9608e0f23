//! Watch Specifiers
//!
//! A derivation names what it depends on with short strings:
//!
//! | specifier           | watches                                        |
//! |---------------------|------------------------------------------------|
//! | `field`             | `updated field`                                |
//! | `collection`        | `added` / `removed` on the collection          |
//! | `collection.*`      | the above plus every record field update       |
//! | `collection.column` | the above, but only updates of `column`        |
//!
//! `column` may be a declared column or a reserved record attribute
//! (`id`, `state`). Specifiers naming the same member are merged into one
//! [`WatchDescriptor`].

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::collection::RESERVED_ATTRIBUTES;
use crate::model::{MemberType, Model};

/// Selector after the `.` of a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    AllFields,
    Column(String),
}

/// A syntactically valid specifier, not yet checked against a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub member: String,
    pub selector: Option<Selector>,
}

impl WatchSpec {
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split('.');
        let member = parts.next().filter(|m| !m.is_empty())?;
        let selector = match parts.next() {
            None => None,
            Some("") => return None,
            Some("*") => Some(Selector::AllFields),
            Some(column) => Some(Selector::Column(column.to_string())),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            member: member.to_string(),
            selector,
        })
    }
}

/// Canonical, merged form of everything watched on one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WatchDescriptor {
    Field,
    Collection {
        all_fields: bool,
        columns: IndexSet<String>,
    },
}

impl WatchDescriptor {
    fn structural() -> Self {
        Self::Collection {
            all_fields: false,
            columns: IndexSet::new(),
        }
    }

    fn all_fields() -> Self {
        Self::Collection {
            all_fields: true,
            columns: IndexSet::new(),
        }
    }

    fn column(column: String) -> Self {
        Self::Collection {
            all_fields: false,
            columns: IndexSet::from([column]),
        }
    }

    /// Whether an update of `column` fires this descriptor.
    pub(crate) fn covers_column(&self, column: &str) -> bool {
        match self {
            Self::Field => false,
            Self::Collection {
                all_fields,
                columns,
            } => *all_fields || columns.contains(column),
        }
    }

    /// Fold another descriptor for the same member into this one.
    /// `*` dominates specific columns.
    fn merge(&mut self, other: WatchDescriptor) {
        if let (
            Self::Collection {
                all_fields,
                columns,
            },
            Self::Collection {
                all_fields: other_all,
                columns: other_columns,
            },
        ) = (self, other)
        {
            *all_fields |= other_all;
            if *all_fields {
                columns.clear();
            } else {
                columns.extend(other_columns);
            }
        }
    }
}

/// Resolve one specifier against the model's current members.
pub(crate) fn resolve(model: &Model, spec: &str) -> Option<(String, WatchDescriptor)> {
    let WatchSpec { member, selector } = WatchSpec::parse(spec)?;
    let descriptor = match (model.member_type(&member), selector) {
        (MemberType::Field, None) => WatchDescriptor::Field,
        (MemberType::Collection, None) => WatchDescriptor::structural(),
        (MemberType::Collection, Some(Selector::AllFields)) => WatchDescriptor::all_fields(),
        (MemberType::Collection, Some(Selector::Column(column))) => {
            let datasource = model.collection(&member)?;
            if !RESERVED_ATTRIBUTES.contains(&column.as_str()) && !datasource.has_column(&column) {
                return None;
            }
            WatchDescriptor::column(column)
        }
        _ => return None,
    };
    Some((member, descriptor))
}

/// Resolve and merge a list of specifiers. `None` if any fails.
pub(crate) fn resolve_all<S: AsRef<str>>(
    model: &Model,
    specs: &[S],
) -> Option<IndexMap<String, WatchDescriptor>> {
    let mut merged: IndexMap<String, WatchDescriptor> = IndexMap::new();
    for spec in specs {
        let (member, descriptor) = resolve(model, spec.as_ref())?;
        match merged.get_mut(&member) {
            Some(existing) => existing.merge(descriptor),
            None => {
                merged.insert(member, descriptor);
            }
        }
    }
    Some(merged)
}
