//! Recomputation benchmarks.
//!
//! Measures how a derived column and a derived field keep up with writes as
//! the watched collection grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use lattice_model::{Datasource, FieldKind, Formula, Model};

fn company_model(companies: usize, employees: usize) -> Model {
    let model = Model::new();
    let company = Datasource::new([
        ("name", FieldKind::Text),
        ("employeeCount", FieldKind::Number),
    ]);
    let employee = Datasource::new([("company", FieldKind::Text), ("name", FieldKind::Text)]);
    for c in 0..companies {
        company.add(json!({"id": format!("c{c}"), "name": format!("company {c}")})).unwrap();
    }
    for e in 0..employees {
        employee
            .add(json!({"company": format!("c{}", e % companies), "name": format!("e{e}")}))
            .unwrap();
    }
    model.extend("company", company).unwrap();
    model.extend("employee", employee).unwrap();
    model.calc(
        "company.employeeCount",
        &["employee.company"],
        Formula::record(|model, company| {
            let id = company.get("id");
            let count = model
                .collection("employee")
                .map(|e| e.iter().filter(|r| r.get("company") == id).count())
                .unwrap_or(0);
            json!(count)
        }),
    );
    model
}

fn bench_column_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_recompute");

    for size in [10, 100, 1000].iter() {
        let model = company_model(10, *size);
        let employee = model.collection("employee").unwrap();
        let record = employee.iter().next().unwrap();
        let mut flip = false;

        group.bench_with_input(BenchmarkId::new("reassign", size), size, |b, _| {
            b.iter(|| {
                flip = !flip;
                let target = if flip { "c1" } else { "c0" };
                record.set("company", json!(target)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_field_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_chain");

    for depth in [1, 10, 50].iter() {
        let model = Model::new();
        model.extend("f0", FieldKind::Number).unwrap();
        for i in 1..=*depth {
            let source = format!("f{}", i - 1);
            model.extend(&format!("f{i}"), FieldKind::Number).unwrap();
            let watched = source.clone();
            model.calc(
                &format!("f{i}"),
                &[source],
                Formula::field(move |m| {
                    json!(m.get(&watched).and_then(|v| v.as_i64()).unwrap_or(0) + 1)
                }),
            );
        }
        let mut n = 0i64;

        group.bench_with_input(BenchmarkId::new("propagate", depth), depth, |b, _| {
            b.iter(|| {
                n += 1;
                model.set("f0", black_box(json!(n))).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_column_recompute, bench_field_chain);
criterion_main!(benches);
