//! Lattice Model
//!
//! This crate provides a reactive entity model: an object whose members are
//! added and removed at runtime and whose values can be declared as derived
//! from other members.
//!
//! It implements:
//!
//! - An extensible member registry (fields, collections, behaviors)
//! - Validated scalar fields with silent equal-value writes
//! - Relaying of collection events onto a per-model event bus
//! - Derived fields and columns with exact teardown
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Event bus, topics and subscriptions
//! - `model`: Model instances, member registry, value store, collection bridge
//! - `graph`: Dependency engine (watch specifiers, derivations)
//! - `field` / `collection`: Field descriptors and record tables
//! - `schema` / `snapshot`: Declarative construction and plain-data export
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_model::{Datasource, FieldKind, Formula, Model};
//! use serde_json::json;
//!
//! let model = Model::new();
//! model.extend("company", Datasource::new([
//!     ("name", FieldKind::Text),
//!     ("employeeCount", FieldKind::Number),
//! ]))?;
//! model.extend("employee", Datasource::new([
//!     ("company", FieldKind::Text),
//!     ("name", FieldKind::Text),
//! ]))?;
//!
//! // Keep every company's head count up to date
//! model.calc("company.employeeCount", &["employee.company"], Formula::record(|model, company| {
//!     let employees = model.collection("employee").unwrap();
//!     json!(employees.iter().filter(|e| e.get("company") == company.get("id")).count())
//! }));
//! ```

pub mod collection;
pub mod error;
pub mod field;
pub mod graph;
pub mod model;
pub mod reactive;
pub mod schema;
pub mod snapshot;

pub use collection::{Datasource, Record, RecordState};
pub use error::{ModelError, Result, ValidationError};
pub use field::{Field, FieldKind, FieldType};
pub use graph::{Formula, WatchDescriptor};
pub use model::{Behavior, MemberKind, MemberType, Model};
pub use reactive::{Event, EventBus, Payload, SubscriptionId, Topic, Verb};
pub use schema::{MemberSchema, ModelSchema};
pub use snapshot::ModelSnapshot;
