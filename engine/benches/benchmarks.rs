//! Performance benchmarks for tome-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;
use tome_engine::{
    DocumentRegistry, DocumentTypeDef, Field, FieldOptions, Schema, UpdateOptions, ValidateOptions,
};

fn actor_schema() -> Schema {
    Schema::new()
        .with_field("name", Field::string(FieldOptions::required()))
        .with_field(
            "hp",
            Field::integer(FieldOptions::default().initial(json!(10))),
        )
        .with_field("tint", Field::color(FieldOptions::default()))
        .with_field(
            "tags",
            Field::set(
                FieldOptions::default().initial(json!([])),
                Field::string(FieldOptions::default()),
            ),
        )
}

fn build_registry() -> DocumentRegistry {
    let item = Arc::new(DocumentTypeDef::new(
        "Item",
        "items",
        Schema::new()
            .with_field("name", Field::string(FieldOptions::required()))
            .with_field(
                "quantity",
                Field::integer(FieldOptions::default().initial(json!(1))),
            ),
    ));
    let mut registry = DocumentRegistry::new();
    registry.register_arc(item.clone());
    registry.register(
        DocumentTypeDef::new(
            "Actor",
            "actors",
            actor_schema().with_field(
                "items",
                Field::embedded(
                    FieldOptions::default().initial(json!([])),
                    "Item",
                    item.schema().clone(),
                ),
            ),
        )
        .with_embedded("items", item),
    );
    registry
}

fn sample_payload() -> Value {
    json!({
        "name": "  Hero  ",
        "hp": "12",
        "tint": "FFAA00",
        "tags": ["fighter", "brave", "fighter"],
    })
}

fn bench_schema_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema_operations");
    let schema = actor_schema();
    let payload = sample_payload();

    group.bench_function("clean", |b| {
        b.iter(|| schema.clean(black_box(&payload)))
    });

    group.bench_function("validate", |b| {
        let source = schema.clean(&payload);
        b.iter(|| schema.validate_source(black_box(&source), ""))
    });

    group.bench_function("initialize", |b| {
        let source = schema.clean(&payload);
        b.iter(|| schema.initialize(black_box(&source)))
    });

    group.finish();
}

fn bench_document_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_operations");
    let registry = build_registry();

    group.bench_function("create", |b| {
        let payload = sample_payload();
        b.iter(|| {
            registry
                .create("Actor", black_box(&payload), &ValidateOptions::strict())
                .unwrap()
        })
    });

    group.bench_function("update_source", |b| {
        let mut doc = registry
            .create("Actor", &sample_payload(), &ValidateOptions::strict())
            .unwrap();
        let mut hp = 0i64;
        b.iter(|| {
            hp += 1;
            doc.update_source(&json!({ "hp": hp }), &UpdateOptions::default())
                .unwrap()
        })
    });

    for count in [1usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("create_with_children", count),
            &count,
            |b, &count| {
                let items: Vec<Value> = (0..count)
                    .map(|i| json!({ "_id": format!("item{i}"), "name": "Sword" }))
                    .collect();
                let payload = json!({ "name": "Hero", "items": items });
                b.iter(|| {
                    registry
                        .create("Actor", black_box(&payload), &ValidateOptions::strict())
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_schema_operations, bench_document_operations);
criterion_main!(benches);
