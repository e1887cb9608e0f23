//! Integration Tests for the Model
//!
//! These tests drive a model the way an embedder does: members added up
//! front, behaviors calling into collections, derivations keeping values in
//! sync, and members removed while derivations still depend on them.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use lattice_model::{
    Behavior, Datasource, FieldKind, Formula, MemberType, Model, ModelError, Record, Topic, Verb,
};

fn company() -> Datasource {
    Datasource::new([("name", FieldKind::Text), ("employeeCount", FieldKind::Number)])
}

fn employee() -> Datasource {
    Datasource::new([("company", FieldKind::Text), ("name", FieldKind::Text)])
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn next_counter(model: &Model) -> lattice_model::Result<i64> {
    let counter = model.get("counter").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
    model.set("counter", json!(counter))?;
    Ok(counter)
}

/// Every call adds a new company with one employee.
fn add_pair() -> Behavior {
    Behavior::new(|model, args| {
        let counter = next_counter(model)?;
        let company_id = format!("c{counter}");
        let company = model.collection("company").ok_or(ModelError::NotAField {
            name: "company".into(),
        })?;
        let employee = model.collection("employee").ok_or(ModelError::NotAField {
            name: "employee".into(),
        })?;
        company.add(json!({"id": company_id, "name": arg(args, 0)}))?;
        employee.add(json!({
            "id": format!("e{counter}-1"),
            "company": company_id,
            "name": arg(args, 1),
        }))?;
        Ok(Value::Null)
    })
}

/// Reuses a company with the same name when there is one.
fn add_employee() -> Behavior {
    Behavior::new(|model, args| {
        let company = model.collection("company").ok_or(ModelError::NotAField {
            name: "company".into(),
        })?;
        let employee = model.collection("employee").ok_or(ModelError::NotAField {
            name: "employee".into(),
        })?;
        let row = match company.find(&json!({"name": arg(args, 0)})) {
            Some(row) => row,
            None => {
                let counter = next_counter(model)?;
                company.add(json!({"id": format!("c{counter}"), "name": arg(args, 0)}))?
            }
        };
        employee.add(json!({"company": row.id(), "name": arg(args, 1)}))?;
        Ok(Value::Null)
    })
}

fn employee_count() -> Formula {
    Formula::record(|model: &Model, company: &Record| {
        let id = company.get("id");
        let count = model
            .collection("employee")
            .map(|employees| employees.iter().filter(|e| e.get("company") == id).count())
            .unwrap_or(0);
        json!(count)
    })
}

fn company_model(add: Behavior) -> Model {
    let model = Model::new();
    model.extend("counter", FieldKind::Number).unwrap();
    model.extend("company", company()).unwrap();
    model.extend("employee", employee()).unwrap();
    model.extend("add", add).unwrap();
    model
}

#[test]
fn behavior_populates_collections() {
    let model = company_model(add_pair());

    model.call("add", &[json!("acme"), json!("alice")]).unwrap();
    assert_eq!(model.get("counter"), Some(json!(1)));

    let companies = model.collection("company").unwrap();
    let employees = model.collection("employee").unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(employees.len(), 1);
    let acme = companies.get("c1").unwrap();
    assert_eq!(acme.get("name"), json!("acme"));
    let alice = employees.get("e1-1").unwrap();
    assert_eq!(alice.get("company"), json!("c1"));
    assert_eq!(alice.get("name"), json!("alice"));

    model.call("add", &[json!("beta"), json!("bob")]).unwrap();
    assert_eq!(model.get("counter"), Some(json!(2)));
    assert!(companies.get("c2").is_some());
    assert!(employees.get("e2-1").is_some());
}

#[test]
fn derived_column_counts_employees() {
    let model = company_model(add_employee());
    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));

    model.call("add", &[json!("japan bank"), json!("tanaka")]).unwrap();
    model.call("add", &[json!("japan soft"), json!("suzuki")]).unwrap();
    model.call("add", &[json!("japan soft"), json!("okawa")]).unwrap();
    model.call("add", &[json!("japan soft"), json!("mori")]).unwrap();

    let companies = model.collection("company").unwrap();
    assert_eq!(companies.get("c1").unwrap().get("employeeCount"), json!(1));
    assert_eq!(companies.get("c2").unwrap().get("employeeCount"), json!(3));
}

#[test]
fn derived_column_follows_reassignment_and_removal() {
    let model = company_model(add_employee());
    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));
    model.call("add", &[json!("a"), json!("x")]).unwrap();
    model.call("add", &[json!("b"), json!("y")]).unwrap();

    let companies = model.collection("company").unwrap();
    let employees = model.collection("employee").unwrap();
    let y = employees.find(&json!({"name": "y"})).unwrap();

    y.set("company", json!("c1")).unwrap();
    assert_eq!(companies.get("c1").unwrap().get("employeeCount"), json!(2));
    assert_eq!(companies.get("c2").unwrap().get("employeeCount"), json!(0));

    employees.remove(&y);
    assert_eq!(companies.get("c1").unwrap().get("employeeCount"), json!(1));
}

#[test]
fn derived_column_covers_existing_records() {
    let model = company_model(add_employee());
    model.call("add", &[json!("a"), json!("x")]).unwrap();
    model.call("add", &[json!("a"), json!("y")]).unwrap();

    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));

    let companies = model.collection("company").unwrap();
    assert_eq!(companies.get("c1").unwrap().get("employeeCount"), json!(2));
}

#[test]
fn removing_target_collection_purges_derivation() {
    let model = company_model(add_employee());
    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));
    model.call("add", &[json!("a"), json!("x")]).unwrap();
    let companies = model.collection("company").unwrap();
    let employees = model.collection("employee").unwrap();

    assert!(model.remove("company"));

    assert!(model.calc_targets().is_empty());
    assert!(!model.uncalc("company.employeeCount"));
    assert_eq!(companies.listener_count(), 0);

    employees.add(json!({"company": "c1", "name": "late"})).unwrap();
    assert_eq!(companies.get("c1").unwrap().get("employeeCount"), json!(1));
}

#[test]
fn second_derivation_for_target_is_rejected() {
    let model = Model::new();
    model.extend("price", FieldKind::Number).unwrap();
    model.extend("total", FieldKind::Number).unwrap();
    model.set("price", json!(2)).unwrap();

    let price = |m: &Model| m.get("price").and_then(|v| v.as_i64()).unwrap_or(0);
    let doubled = Formula::field(move |m| json!(price(m) * 2));
    let tripled = Formula::field(move |m| json!(price(m) * 3));

    assert!(model.calc("total", &["price"], doubled));
    assert!(!model.calc("total", &["price"], tripled));

    model.set("price", json!(5)).unwrap();
    assert_eq!(model.get("total"), Some(json!(10)));
}

#[test]
fn removing_watched_collection_leaves_nothing_attached() {
    let model = Model::new();
    let orders = Datasource::new([("amount", FieldKind::Number)]);
    model.extend("orders", orders.clone()).unwrap();
    model.extend("total", FieldKind::Number).unwrap();

    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();
    let total = Formula::field(move |m| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let sum: i64 = m
            .collection("orders")
            .map(|o| o.iter().map(|r| r.get("amount").as_i64().unwrap_or(0)).sum())
            .unwrap_or(0);
        json!(sum)
    });
    assert!(model.calc("total", &["orders.*"], total));
    let record = orders.add(json!({"amount": 3})).unwrap();
    assert_eq!(model.get("total"), Some(json!(3)));

    assert!(model.remove("orders"));
    let runs_after_removal = runs.load(Ordering::SeqCst);

    assert!(!model.uncalc("total"));
    orders.add(json!({"amount": 4})).unwrap();
    record.set("amount", json!(9)).unwrap();
    orders.remove(&record);

    assert_eq!(runs.load(Ordering::SeqCst), runs_after_removal);
    assert_eq!(model.get("total"), Some(json!(3)));
    assert_eq!(orders.listener_count(), 0);
    assert_eq!(model.bus().total_subscriptions(), 0);
}

#[test]
fn clear_tears_down_everything() {
    let model = company_model(add_employee());
    let companies = model.collection("company").unwrap();
    let employees = model.collection("employee").unwrap();
    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));

    model.clear();

    assert!(model.member_names().is_empty());
    assert!(model.calc_targets().is_empty());
    assert_eq!(companies.listener_count(), 0);
    assert_eq!(employees.listener_count(), 0);
    assert_eq!(model.bus().total_subscriptions(), 0);
    assert_eq!(model.member_type("company"), MemberType::Unused);
}

#[test]
fn derivations_chain_through_collections() {
    let model = company_model(add_employee());
    model.extend("largest", FieldKind::Number).unwrap();
    assert!(model.calc("company.employeeCount", &["employee.company"], employee_count()));
    assert!(model.calc(
        "largest",
        &["company.employeeCount"],
        Formula::field(|m| {
            let largest = m
                .collection("company")
                .map(|c| {
                    c.iter()
                        .filter_map(|r| r.get("employeeCount").as_i64())
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);
            json!(largest)
        })
    ));

    model.call("add", &[json!("a"), json!("x")]).unwrap();
    model.call("add", &[json!("b"), json!("y")]).unwrap();
    model.call("add", &[json!("b"), json!("z")]).unwrap();

    assert_eq!(model.get("largest"), Some(json!(2)));
}

#[test]
fn handlers_see_relayed_record_payloads() {
    let model = company_model(add_pair());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    model.on(Topic::new(Verb::Added, "employee"), move |event| {
        if let Some(record) = event.payload.record() {
            seen_clone.lock().push(record.get("name"));
        }
    });

    model.call("add", &[json!("acme"), json!("alice")]).unwrap();

    assert_eq!(*seen.lock(), vec![json!("alice")]);
}
