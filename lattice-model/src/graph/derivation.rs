//! Derivations
//!
//! A derivation keeps one target up to date: either a scalar field of the
//! model, or one column of every record in a collection.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::collection::{Record, RESERVED_ATTRIBUTES};
use crate::error::Result;
use crate::model::{MemberType, Model, WeakModel};
use crate::reactive::{Event, Handler, SubscriptionId, Topic};

use super::watch::{Selector, WatchDescriptor, WatchSpec};

pub type FieldFormula = Arc<dyn Fn(&Model) -> Value + Send + Sync>;
pub type RecordFormula = Arc<dyn Fn(&Model, &Record) -> Value + Send + Sync>;

/// How a derived value is computed. The variant must match the target:
/// fields take [`Formula::Field`], collection columns [`Formula::Record`].
#[derive(Clone)]
pub enum Formula {
    Field(FieldFormula),
    Record(RecordFormula),
}

impl Formula {
    pub fn field<F>(f: F) -> Self
    where
        F: Fn(&Model) -> Value + Send + Sync + 'static,
    {
        Self::Field(Arc::new(f))
    }

    pub fn record<F>(f: F) -> Self
    where
        F: Fn(&Model, &Record) -> Value + Send + Sync + 'static,
    {
        Self::Record(Arc::new(f))
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(_) => f.write_str("Formula::Field"),
            Self::Record(_) => f.write_str("Formula::Record"),
        }
    }
}

/// What a derivation writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Field(String),
    Column { collection: String, column: String },
}

impl Target {
    /// `field` or `collection.column`, where `column` is a declared column.
    pub(crate) fn resolve(model: &Model, name: &str) -> Option<Self> {
        let WatchSpec { member, selector } = WatchSpec::parse(name)?;
        match (model.member_type(&member), selector) {
            (MemberType::Field, None) => Some(Self::Field(member)),
            (MemberType::Collection, Some(Selector::Column(column))) => {
                let writable = !RESERVED_ATTRIBUTES.contains(&column.as_str())
                    && model.collection(&member)?.has_column(&column);
                writable.then_some(Self::Column {
                    collection: member,
                    column,
                })
            }
            _ => None,
        }
    }

    pub(crate) fn member(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::Column { collection, .. } => collection,
        }
    }
}

/// A target bound to its formula.
#[derive(Clone)]
pub(crate) enum Trigger {
    Field {
        name: String,
        formula: FieldFormula,
    },
    Column {
        collection: String,
        column: String,
        formula: RecordFormula,
    },
}

impl Trigger {
    /// `None` when the formula does not fit the target.
    pub(crate) fn new(target: Target, formula: Formula) -> Option<Self> {
        match (target, formula) {
            (Target::Field(name), Formula::Field(formula)) => Some(Self::Field { name, formula }),
            (Target::Column { collection, column }, Formula::Record(formula)) => {
                Some(Self::Column {
                    collection,
                    column,
                    formula,
                })
            }
            _ => None,
        }
    }

    /// Recompute the whole target: the field, or the column of every
    /// current record.
    pub(crate) fn run_all(&self, model: &Model) -> Result<()> {
        match self {
            Self::Field { name, formula } => {
                let value = formula(model);
                tracing::trace!(target_field = %name, "recompute field");
                model.set(name, value).map(drop)
            }
            Self::Column {
                collection,
                column,
                formula,
            } => {
                let Some(datasource) = model.collection(collection) else {
                    return Ok(());
                };
                tracing::trace!(
                    collection = %collection,
                    column = %column,
                    records = datasource.len(),
                    "recompute column"
                );
                for record in datasource.iter() {
                    record.set_computed(column, formula(model, &record));
                }
                Ok(())
            }
        }
    }

    /// Recompute the column of a single record.
    pub(crate) fn run_one(&self, model: &Model, record: &Record) {
        if let Self::Column { column, formula, .. } = self {
            record.set_computed(column, formula(model, record));
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Field { name, .. } => name.clone(),
            Self::Column {
                collection, column, ..
            } => format!("{collection}.{column}"),
        }
    }

    fn run_all_logged(&self, model: &Model) {
        if let Err(err) = self.run_all(model) {
            tracing::warn!(
                target_member = %self.describe(),
                error = %err,
                "derived value rejected"
            );
        }
    }
}

/// Which events of a topic cause a recomputation.
pub(crate) enum Reaction {
    /// Recompute the record carried by the event.
    AddedRecord,
    /// Recompute everything.
    All,
    /// Recompute everything when the updated field is one of these.
    Columns(Vec<String>),
}

pub(crate) fn handler(model: WeakModel, trigger: Trigger, reaction: Reaction) -> Handler {
    Arc::new(move |event: &Event| {
        let Some(model) = model.upgrade() else {
            return;
        };
        match &reaction {
            Reaction::AddedRecord => {
                if let Some(record) = event.payload.record() {
                    trigger.run_one(&model, record);
                }
            }
            Reaction::All => trigger.run_all_logged(&model),
            Reaction::Columns(columns) => {
                let watched = event
                    .payload
                    .field()
                    .is_some_and(|field| columns.iter().any(|c| c == field));
                if watched {
                    trigger.run_all_logged(&model);
                }
            }
        }
    })
}

pub(crate) type Subscriptions = SmallVec<[(Topic, SubscriptionId); 4]>;

/// A registered derivation and the subscriptions that implement it.
pub(crate) struct Derivation {
    pub(crate) target: Target,
    pub(crate) watches: IndexMap<String, WatchDescriptor>,
    pub(crate) subscriptions: Subscriptions,
}

impl Derivation {
    /// Whether removing `member` invalidates this derivation.
    pub(crate) fn references(&self, member: &str) -> bool {
        self.target.member() == member
            || self.watches.contains_key(member)
            || self.subscriptions.iter().any(|(topic, _)| topic.member() == member)
    }
}
