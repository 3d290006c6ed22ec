//! Integration tests for tome-engine
//!
//! These tests exercise the full document stack: registry, schemas,
//! documents, embedded collections, ownership, and update flows.

use serde_json::{json, Value};
use std::sync::Arc;
use tome_engine::{
    Action, DocumentRegistry, DocumentTypeDef, Error, FailureKind, Field, FieldOptions,
    LifecycleState, OwnershipLevel, RequiredLevels, Schema, UpdateOptions, ValidateOptions,
    ValidationFailure,
};

fn item_def() -> Arc<DocumentTypeDef> {
    Arc::new(DocumentTypeDef::new(
        "Item",
        "items",
        Schema::new()
            .with_field("name", Field::string(FieldOptions::required()))
            .with_field(
                "quantity",
                Field::integer(FieldOptions::default().initial(json!(1))),
            )
            .with_field("tint", Field::color(FieldOptions::default())),
    ))
}

fn build_registry() -> DocumentRegistry {
    let mut registry = DocumentRegistry::new();
    let item = item_def();
    registry.register_arc(item.clone());
    registry.register(
        DocumentTypeDef::new(
            "Actor",
            "actors",
            Schema::new()
                .with_field("name", Field::string(FieldOptions::required()))
                .with_field(
                    "hp",
                    Field::integer(FieldOptions::default().initial(json!(10))),
                )
                .with_field(
                    "maxHp",
                    Field::integer(FieldOptions::default().initial(json!(10))),
                )
                .with_field("ownership", Field::json(FieldOptions::default()))
                .with_field(
                    "items",
                    Field::embedded(
                        FieldOptions::default().initial(json!([])),
                        "Item",
                        item.schema().clone(),
                    ),
                ),
        )
        .with_embedded("items", item)
        .with_joint_validator(|source| {
            let hp = source.get("hp").and_then(Value::as_i64).unwrap_or(0);
            let max = source.get("maxHp").and_then(Value::as_i64).unwrap_or(0);
            if hp > max {
                Err(ValidationFailure::new(
                    "hp",
                    FailureKind::Joint,
                    json!(hp),
                    "hp may not exceed maxHp",
                ))
            } else {
                Ok(())
            }
        }),
    );
    registry
}

// ============================================================================
// Construction and Sealed Sources
// ============================================================================

#[test]
fn unknown_keys_never_reach_the_source() {
    let registry = build_registry();
    let doc = registry
        .create(
            "Actor",
            &json!({ "name": "Hero", "speed": 30, "nested": { "junk": 1 } }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    assert!(!doc.source().contains_key("speed"));
    assert!(!doc.source().contains_key("nested"));
}

#[test]
fn initials_fill_absent_fields() {
    let registry = build_registry();
    let doc = registry
        .create("Actor", &json!({ "name": "Hero" }), &ValidateOptions::strict())
        .unwrap();
    assert_eq!(doc.get("hp"), Some(&json!(10)));
    assert_eq!(doc.get("items"), Some(&json!([])));
}

#[test]
fn strict_construction_aggregates_all_failures() {
    let registry = build_registry();
    let result = registry.create(
        "Actor",
        &json!({ "hp": "broken", "maxHp": [1] }),
        &ValidateOptions::strict(),
    );
    match result {
        Err(Error::Validation(failures)) => {
            // missing name plus two bad numbers, all reported at once
            assert_eq!(failures.len(), 3);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn lenient_construction_repairs_persisted_data() {
    let registry = build_registry();
    let doc = registry
        .create(
            "Actor",
            &json!({ "hp": "broken" }),
            &ValidateOptions::lenient(),
        )
        .unwrap();
    assert_eq!(doc.get("name"), Some(&json!("")));
    assert_eq!(doc.get("hp"), Some(&json!(10)));
}

// ============================================================================
// Updates
// ============================================================================

#[test]
fn update_reports_only_effective_changes() {
    let registry = build_registry();
    let mut doc = registry
        .create(
            "Actor",
            &json!({ "name": "Hero", "hp": 8 }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    let changed = doc
        .update_source(
            &json!({ "name": "Hero", "hp": 9, "maxHp": 10 }),
            &UpdateOptions::default(),
        )
        .unwrap();
    assert_eq!(changed, vec!["hp".to_string()]);
}

#[test]
fn failed_update_is_atomic() {
    let registry = build_registry();
    let mut doc = registry
        .create(
            "Actor",
            &json!({ "name": "Hero", "hp": 8 }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    let result = doc.update_source(
        &json!({ "name": "Renamed", "hp": "broken" }),
        &UpdateOptions::default(),
    );
    assert!(result.is_err());
    assert_eq!(doc.get("name"), Some(&json!("Hero")));
    assert_eq!(doc.get("hp"), Some(&json!(8)));
}

#[test]
fn embedded_update_rebuilds_the_collection() {
    let registry = build_registry();
    let mut doc = registry
        .create(
            "Actor",
            &json!({
                "name": "Hero",
                "items": [{ "_id": "item1", "name": "Sword" }],
            }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    doc.update_source(
        &json!({
            "items": [
                { "_id": "item1", "name": "Sword" },
                { "_id": "item2", "name": "Shield" },
            ],
        }),
        &UpdateOptions::default(),
    )
    .unwrap();
    let items = doc.embedded("items").unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.contains("item2"));
}

// ============================================================================
// Embedded Collections
// ============================================================================

#[test]
fn children_validate_against_the_child_schema() {
    let registry = build_registry();
    let result = registry.create(
        "Actor",
        &json!({
            "name": "Hero",
            "items": [{ "_id": "item1", "name": "Sword", "quantity": "lots" }],
        }),
        &ValidateOptions::strict(),
    );
    match result {
        Err(Error::Validation(failures)) => {
            assert_eq!(failures.first().unwrap().path, "items.0.quantity");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn moving_a_child_between_parents() {
    let registry = build_registry();
    let mut source_doc = registry
        .create(
            "Actor",
            &json!({
                "name": "Giver",
                "items": [{ "_id": "item1", "name": "Sword" }],
            }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    source_doc.set_id("actor1").unwrap();
    let mut target_doc = registry
        .create("Actor", &json!({ "name": "Taker" }), &ValidateOptions::strict())
        .unwrap();
    target_doc.set_id("actor2").unwrap();

    let child = source_doc.embedded_mut("items").unwrap().take("item1").unwrap();
    target_doc.embedded_mut("items").unwrap().insert(child).unwrap();
    source_doc.commit_embedded("items").unwrap();
    target_doc.commit_embedded("items").unwrap();

    assert!(source_doc.embedded("items").unwrap().is_empty());
    assert_eq!(
        target_doc.embedded("items").unwrap().get("item1").unwrap().parent().unwrap().id,
        "actor2"
    );
    assert_eq!(source_doc.source().get("items"), Some(&json!([])));
}

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn custom_required_levels() {
    let mut registry = DocumentRegistry::new();
    registry.register(
        DocumentTypeDef::new(
            "Note",
            "notes",
            Schema::new()
                .with_field("text", Field::string(FieldOptions::default()))
                .with_field("ownership", Field::json(FieldOptions::default())),
        )
        .with_required_levels(RequiredLevels {
            view: OwnershipLevel::None,
            update: OwnershipLevel::Observer,
            delete: OwnershipLevel::Owner,
        }),
    );
    let doc = registry
        .create(
            "Note",
            &json!({ "text": "hi", "ownership": { "default": 2 } }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    assert!(doc.can_user("anyone", Action::Update));
    assert!(!doc.can_user("anyone", Action::Delete));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn full_lifecycle_round_trip() {
    let registry = build_registry();
    let mut doc = registry
        .create("Actor", &json!({ "name": "Hero" }), &ValidateOptions::strict())
        .unwrap();

    doc.mark_pending().unwrap();
    doc.set_id("actor1").unwrap();
    doc.mark_stored().unwrap();
    assert_eq!(doc.state(), LifecycleState::Stored);

    doc.mark_pending().unwrap();
    doc.mark_deleted().unwrap();
    assert_eq!(doc.state(), LifecycleState::Deleted);
    assert!(doc.mark_stored().is_err());
}

// ============================================================================
// Cloning and Import
// ============================================================================

#[test]
fn clone_with_overrides_keeps_original_intact() {
    let registry = build_registry();
    let doc = registry
        .create(
            "Actor",
            &json!({ "name": "Hero", "hp": 8 }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    let copy = doc
        .clone_with(&json!({ "name": "Hero (Copy)" }), &ValidateOptions::strict())
        .unwrap();
    assert_eq!(copy.get("name"), Some(&json!("Hero (Copy)")));
    assert_eq!(copy.get("hp"), Some(&json!(8)));
    assert_eq!(doc.get("name"), Some(&json!("Hero")));
}

#[test]
fn runtime_and_source_forms_round_trip() {
    let registry = build_registry();
    let item = registry
        .create(
            "Item",
            &json!({ "name": "Sword", "tint": "FFAA00" }),
            &ValidateOptions::strict(),
        )
        .unwrap();
    let runtime = item.to_object(false);
    assert_eq!(runtime["tint"], json!({ "r": 255, "g": 170, "b": 0 }));
    let source = item.to_object(true);
    assert_eq!(source["tint"], json!("#ffaa00"));
}
