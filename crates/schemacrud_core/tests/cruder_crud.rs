use schemacrud_core::schema::{load, ModelSpec};
use schemacrud_core::{
    CreateViolation, CrudError, CrudOutcome, CrudRequest, CrudType, Cruder, CruderRegistry,
    Database, ExecutionOutcome, FilterOp, QueryError, Scalar,
};
use serde_json::json;
use std::sync::Arc;

fn users_registry() -> CruderRegistry {
    let models = load(vec![ModelSpec::new(
        "users",
        [("id", "INTEGER"), ("name", "VARCHAR")],
    )])
    .unwrap();
    let registry = CruderRegistry::new(Arc::new(Database::open_in_memory().unwrap()), models);
    registry.ensure_tables().unwrap();
    registry
}

fn body(value: serde_json::Value) -> CrudRequest {
    CrudRequest::from_json(&value).unwrap()
}

fn count_rows(cruder: &Cruder) -> usize {
    cruder.read(&CrudRequest::default()).unwrap().len()
}

#[test]
fn create_then_read_returns_written_record() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();

    let inserted = users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();
    assert_eq!(inserted, 1);

    let records = users.read(&body(json!({"where": {"id": 1}}))).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("id"), Some(&json!("1")));
    assert_eq!(records[0].get("name"), Some(&json!("Alice")));

    let outcome = registry
        .dispatch_path("/users/read", &json!({"where": {"id": 1}}))
        .unwrap();
    assert_eq!(outcome.into_json(), json!([{"id": "1", "name": "Alice"}]));
}

#[test]
fn create_binds_in_column_order_regardless_of_body_order() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();

    users
        .create(&body(json!({"name": "Bob", "id": 2})))
        .unwrap();

    let records = users.read(&body(json!({"where": {"name": "Bob"}}))).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!("2"));
}

#[test]
fn invalid_create_fails_without_mutation() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();

    let err = users.create(&body(json!({"name": "Alice"}))).unwrap_err();
    assert!(matches!(
        err,
        CrudError::InvalidCreate {
            violation: CreateViolation::MissingColumns(ref columns),
            ..
        } if columns == &vec!["id".to_string()]
    ));

    let err = users
        .create(&body(json!({"id": 1, "name": "Alice", "email": "a@example.com"})))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::InvalidCreate {
            violation: CreateViolation::UnknownColumns(_),
            ..
        }
    ));

    let duplicate = CrudRequest::default()
        .with_value("id", Scalar::integer(1))
        .with_value("id", Scalar::integer(2))
        .with_value("name", Scalar::text("Alice"));
    let err = users.create(&duplicate).unwrap_err();
    assert_eq!(err.code(), "invalid_create");

    assert_eq!(count_rows(users), 0);
    assert_eq!(users.cache().len(), 1, "only the filterless read is cached");
}

#[test]
fn filterless_read_returns_every_row() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Carol")] {
        users
            .create(&body(json!({"id": id, "name": name})))
            .unwrap();
    }

    let records = users.read(&CrudRequest::default()).unwrap();
    assert_eq!(records.len(), 3);

    let outcome = registry
        .dispatch("users", CrudType::Read, &json!({}))
        .unwrap();
    assert!(matches!(outcome, CrudOutcome::Records(records) if records.len() == 3));
}

#[test]
fn update_changes_only_named_columns_of_matching_rows() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();
    users.create(&body(json!({"id": 2, "name": "Bob"}))).unwrap();

    let changed = users
        .update(&body(json!({"name": "Alicia", "where": {"id": 1}})))
        .unwrap();
    assert_eq!(changed, 1);

    let records = users.read(&body(json!({"where": {"id": 1}}))).unwrap();
    assert_eq!(records[0]["name"], json!("Alicia"));
    let untouched = users.read(&body(json!({"where": {"id": 2}}))).unwrap();
    assert_eq!(untouched[0]["name"], json!("Bob"));
}

#[test]
fn update_and_delete_without_filters_are_rejected() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();

    let err = users.update(&body(json!({"name": "Everyone"}))).unwrap_err();
    assert!(matches!(
        err,
        CrudError::Query {
            source: QueryError::MissingFilter(CrudType::Update),
            ..
        }
    ));

    let err = users.remove(&CrudRequest::default()).unwrap_err();
    assert!(matches!(
        err,
        CrudError::Query {
            source: QueryError::MissingFilter(CrudType::Delete),
            ..
        }
    ));
    assert_eq!(count_rows(users), 1);
}

#[test]
fn remove_deletes_matching_rows() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    for id in 1..=4 {
        users
            .create(&body(json!({"id": id, "name": format!("user-{id}")})))
            .unwrap();
    }

    let removed = users
        .remove(&CrudRequest::default().with_filter("id", FilterOp::Gt, Scalar::integer(2)))
        .unwrap();
    assert_eq!(removed, 2);

    let deleted = registry
        .dispatch_path("/users/delete", &json!({"where": {"name": "user-1"}}))
        .unwrap();
    assert_eq!(deleted, CrudOutcome::Affected(1));

    let remaining = users.read(&CrudRequest::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], json!("2"));
}

#[test]
fn comparison_filters_select_ranges() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    for id in 1..=5 {
        users
            .create(&body(json!({"id": id, "name": "n"})))
            .unwrap();
    }

    let request = CrudRequest::default()
        .with_filter("id", FilterOp::Ge, Scalar::integer(2))
        .with_filter("id", FilterOp::Lt, Scalar::integer(4));
    let ids: Vec<_> = users
        .read(&request)
        .unwrap()
        .into_iter()
        .map(|record| record["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("2"), json!("3")]);
}

#[test]
fn literals_are_bound_not_interpolated() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    let hostile = "Robert'); DROP TABLE users; --";
    users
        .create(&body(json!({"id": 1, "name": hostile})))
        .unwrap();

    let records = users
        .read(&body(json!({"where": {"name": hostile}})))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], json!(hostile));
}

#[test]
fn unknown_fields_and_unsupported_values_are_reported() {
    let registry = users_registry();

    let err = registry
        .dispatch("users", CrudType::Read, &json!({"where": {"email": "x"}}))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::Query {
            source: QueryError::UnknownField { ref field, .. },
            ..
        } if field == "email"
    ));

    let err = registry
        .dispatch("users", CrudType::Create, &json!({"id": 1, "name": ["a"]}))
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_value_type");

    let err = registry
        .dispatch("invoices", CrudType::Read, &json!({}))
        .unwrap_err();
    assert!(matches!(err, CrudError::UnknownModel(model) if model == "invoices"));

    let err = registry
        .dispatch_path("/users/upsert", &json!({}))
        .unwrap_err();
    assert!(matches!(err, CrudError::UnknownRoute(_)));
}

#[test]
fn constraint_violation_reports_nothing_applied() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.acquire()
        .unwrap()
        .execute_batch("CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \"name\" VARCHAR(255));")
        .unwrap();
    let models = load(vec![ModelSpec::new(
        "users",
        [("id", "INTEGER"), ("name", "VARCHAR")],
    )])
    .unwrap();
    let registry = CruderRegistry::new(db, models);
    assert!(registry.ensure_tables().unwrap().is_empty());
    let users = registry.get("users").unwrap();

    users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();
    let err = users
        .create(&body(json!({"id": 1, "name": "Again"})))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::QueryExecution {
            crud_type: CrudType::Create,
            outcome: ExecutionOutcome::NothingApplied,
            ..
        }
    ));
    assert_eq!(count_rows(users), 1);
}

#[test]
fn unknown_value_fields_are_rejected_without_caching() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();
    users.create(&body(json!({"id": 2, "name": "Bob"}))).unwrap();
    let cached = users.cache().len();

    for (crud_type, request) in [
        (CrudType::Read, json!({"email": "nobody"})),
        (CrudType::Update, json!({"email": "x", "where": {"id": 1}})),
        (CrudType::Delete, json!({"bogus": 1, "where": {"id": 2}})),
    ] {
        let err = registry.dispatch("users", crud_type, &request).unwrap_err();
        assert!(
            matches!(
                err,
                CrudError::Query {
                    source: QueryError::UnknownField { .. },
                    ..
                }
            ),
            "{crud_type}: {err}"
        );
    }

    let err = registry
        .dispatch("users", CrudType::Read, &json!({"name": "Alice"}))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::Query {
            source: QueryError::UnexpectedValue { crud_type: CrudType::Read, ref field },
            ..
        } if field == "name"
    ));

    assert_eq!(users.cache().len(), cached);
    assert_eq!(users.cache().slot_count(), cached);
    assert_eq!(count_rows(users), 2);
}

#[test]
fn junk_field_names_never_grow_the_cache() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    count_rows(users);

    for index in 0..200 {
        let mut junk = serde_json::Map::new();
        junk.insert(format!("junk{index}"), json!(1));
        let junk = serde_json::Value::Object(junk);
        assert!(registry.dispatch("users", CrudType::Read, &junk).is_err());
        let junk_filter = json!({ "where": junk });
        assert!(registry.dispatch("users", CrudType::Read, &junk_filter).is_err());
    }

    for name in ["Alice", "Bob", "Carol"] {
        users
            .read(&body(json!({"where": {"name": name}})))
            .unwrap();
    }

    assert_eq!(users.cache().len(), 2);
    assert_eq!(users.cache().slot_count(), 2);
    assert_eq!(users.cache().compile_count(), 2);
}

#[test]
fn separator_characters_cannot_alias_a_cached_shape() {
    let registry = users_registry();
    let users = registry.get("users").unwrap();
    users.create(&body(json!({"id": 1, "name": "Alice"}))).unwrap();

    let err = users
        .create(&CrudRequest::default().with_value("id,name", Scalar::integer(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::InvalidCreate {
            violation: CreateViolation::UnknownColumns(ref columns),
            ..
        } if columns == &vec!["id,name".to_string()]
    ));

    let err = users
        .create(&body(json!({"id": 2, "name": "Bob", "where": {"id": 1}})))
        .unwrap_err();
    assert!(matches!(
        err,
        CrudError::Query {
            source: QueryError::UnexpectedFilter { .. },
            ..
        }
    ));
    assert_eq!(count_rows(users), 1);
}
