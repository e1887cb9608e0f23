//! Record Collections
//!
//! A [`Datasource`] is a table of [`Record`]s with declared, typed columns.
//! It is owned by whoever built it; a model only borrows it when the
//! datasource is added as a member, and only attaches listeners to it.
//!
//! # Native Events
//!
//! A datasource emits three events, each to any number of listeners:
//!
//! - added: a record was inserted
//! - updated: one field of a record changed
//! - removed: a record was taken out
//!
//! Listeners run synchronously and without any datasource lock held.

mod record;

pub use record::{Record, RecordState, ID, RESERVED_ATTRIBUTES, STATE};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{ModelError, Result, ValidationError};
use crate::field::Field;

/// Event emitted by a datasource.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Added(Record),
    Updated { record: Record, field: String },
    Removed(Record),
}

impl CollectionEvent {
    pub fn kind(&self) -> CollectionEventKind {
        match self {
            Self::Added(_) => CollectionEventKind::Added,
            Self::Updated { .. } => CollectionEventKind::Updated,
            Self::Removed(_) => CollectionEventKind::Removed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionEventKind {
    Added,
    Updated,
    Removed,
}

/// Identifies a listener attached to a datasource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type CollectionHandler = Arc<dyn Fn(&CollectionEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: CollectionEventKind,
    handler: CollectionHandler,
    /// Shared with in-flight emit snapshots; cleared by `off`.
    active: Arc<AtomicBool>,
}

pub(crate) struct DatasourceInner {
    columns: IndexMap<String, Field>,
    records: RwLock<IndexMap<String, Record>>,
    listeners: RwLock<Vec<Listener>>,
    next_record: AtomicU64,
    next_listener: AtomicU64,
}

impl DatasourceInner {
    fn column(&self, name: &str) -> Option<&Field> {
        self.columns.get(name)
    }

    fn emit(&self, event: &CollectionEvent) {
        let kind = event.kind();
        let handlers: Vec<(CollectionHandler, Arc<AtomicBool>)> = self
            .listeners
            .read()
            .iter()
            .filter(|listener| listener.kind == kind)
            .map(|listener| (listener.handler.clone(), listener.active.clone()))
            .collect();
        for (handler, active) in handlers {
            if active.load(Ordering::SeqCst) {
                handler(event);
            }
        }
    }

    fn generate_id(&self, records: &IndexMap<String, Record>) -> String {
        loop {
            let n = self.next_record.fetch_add(1, Ordering::Relaxed) + 1;
            let id = format!("r{n}");
            if !records.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Shared handle to a table of records.
#[derive(Clone)]
pub struct Datasource {
    inner: Arc<DatasourceInner>,
}

impl Datasource {
    /// Create a datasource with the given columns, in declaration order.
    ///
    /// `id` and `state` are record attributes and cannot be declared as
    /// columns; such declarations are ignored.
    pub fn new<N, F>(columns: impl IntoIterator<Item = (N, F)>) -> Self
    where
        N: Into<String>,
        F: Into<Field>,
    {
        let mut declared = IndexMap::new();
        for (name, field) in columns {
            let name = name.into();
            if RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                tracing::warn!(column = %name, "reserved record attribute ignored as column");
                continue;
            }
            declared.insert(name, field.into());
        }
        Self {
            inner: Arc::new(DatasourceInner {
                columns: declared,
                records: RwLock::new(IndexMap::new()),
                listeners: RwLock::new(Vec::new()),
                next_record: AtomicU64::new(0),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Declared column names, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.inner.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&Field> {
        self.inner.column(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.inner.columns.contains_key(name)
    }

    /// Insert a record from a JSON object of column values.
    ///
    /// A string `id` key is used as the record id; without one an id is
    /// generated. Columns not present in `data` start as `Null`.
    pub fn add(&self, data: Value) -> Result<Record> {
        let Value::Object(mut data) = data else {
            return Err(ModelError::NotAnObject);
        };
        let id = match data.remove(ID) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                let found = match other {
                    Value::Number(_) => "number",
                    Value::Bool(_) => "boolean",
                    Value::Array(_) => "array",
                    _ => "object",
                };
                return Err(ModelError::validation(ID, ValidationError::new("text", found)));
            }
        };

        let mut values = Map::new();
        for (name, field) in &self.inner.columns {
            let value = data.remove(name).unwrap_or(Value::Null);
            field
                .validate(&value)
                .map_err(|source| ModelError::validation(name.as_str(), source))?;
            values.insert(name.clone(), value);
        }
        if let Some(column) = data.keys().next() {
            return Err(ModelError::UnknownColumn {
                column: column.clone(),
            });
        }

        let record = {
            let mut records = self.inner.records.write();
            let id = match id {
                Some(id) if records.contains_key(&id) => {
                    return Err(ModelError::DuplicateRecord { id });
                }
                Some(id) => id,
                None => self.inner.generate_id(&records),
            };
            let record = Record::new(id.clone(), values, Arc::downgrade(&self.inner));
            records.insert(id, record.clone());
            record
        };

        self.inner.emit(&CollectionEvent::Added(record.clone()));
        Ok(record)
    }

    /// Take a record out. Returns `false` if it is not in this datasource.
    pub fn remove(&self, record: &Record) -> bool {
        let removed = {
            let mut records = self.inner.records.write();
            match records.get(record.id()) {
                Some(existing) if existing.ptr_eq(record) => records.shift_remove(record.id()),
                _ => None,
            }
        };
        match removed {
            Some(record) => {
                record.mark_removed();
                self.inner.emit(&CollectionEvent::Removed(record));
                true
            }
            None => false,
        }
    }

    /// The live record with this id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.inner.records.read().get(id).cloned()
    }

    /// First record whose values match every key of the `query` object.
    pub fn find(&self, query: &Value) -> Option<Record> {
        let query = query.as_object()?;
        self.iter()
            .find(|record| query.iter().all(|(name, value)| record.get(name) == *value))
    }

    /// Current records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.inner.records.read().values().cloned().collect()
    }

    /// Iterate over a snapshot of the current records. Call again to
    /// restart from the current contents.
    pub fn iter(&self) -> std::vec::IntoIter<Record> {
        self.records().into_iter()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a listener for one kind of native event.
    pub fn on(&self, kind: CollectionEventKind, handler: CollectionHandler) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push(Listener {
            id,
            kind,
            handler,
            active: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    /// Detach a listener. Returns `false` if it was not attached. A
    /// detached listener is not called again, even by an emit in progress.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        match listeners.iter().position(|listener| listener.id == id) {
            Some(index) => {
                listeners.remove(index).active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    pub fn ptr_eq(&self, other: &Datasource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<'a> IntoIterator for &'a Datasource {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("columns", &self.inner.columns.keys().collect::<Vec<_>>())
            .field("records", &self.len())
            .finish()
    }
}
