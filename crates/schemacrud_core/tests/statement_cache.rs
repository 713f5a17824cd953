use schemacrud_core::schema::{load, Model, ModelSpec};
use schemacrud_core::{CrudError, CrudRequest, CrudType, Cruder, Database, DatabaseConfig};
use serde_json::json;
use std::sync::{Arc, Barrier};

fn orders_model() -> Model {
    load(vec![ModelSpec::new(
        "orders",
        [("id", "INTEGER"), ("status", "VARCHAR")],
    )])
    .unwrap()
    .remove(0)
}

fn orders_cruder(db: Arc<Database>) -> Cruder {
    let model = orders_model();
    schemacrud_core::db::ensure_table(&db, &model).unwrap();
    Cruder::new(db, Arc::new(model))
}

fn status_filter(status: &str) -> CrudRequest {
    CrudRequest::from_json(&json!({"where": {"status": status}})).unwrap()
}

#[test]
fn reads_with_different_literals_share_one_statement() {
    let orders = orders_cruder(Arc::new(Database::open_in_memory().unwrap()));
    orders
        .create(&CrudRequest::from_json(&json!({"id": 1, "status": "a"})).unwrap())
        .unwrap();

    let first = orders.read(&status_filter("a")).unwrap();
    let second = orders.read(&status_filter("b")).unwrap();
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());

    let key = status_filter("a").shape(CrudType::Read).key();
    let cached = orders.cache().get(&key).unwrap();
    assert!(Arc::ptr_eq(
        &cached,
        &orders
            .cache()
            .get(&status_filter("zzz").shape(CrudType::Read).key())
            .unwrap()
    ));
    // One create shape plus one read shape.
    assert_eq!(orders.cache().compile_count(), 2);
}

#[test]
fn concurrent_first_reads_compile_once() {
    const CALLERS: usize = 24;
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&DatabaseConfig {
        path: Some(dir.path().join("orders.db")),
        pool_size: 4,
        ..DatabaseConfig::default()
    })
    .unwrap();
    let orders = orders_cruder(Arc::new(db));
    let barrier = Barrier::new(CALLERS);

    std::thread::scope(|scope| {
        for caller in 0..CALLERS {
            let orders = &orders;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                let records = orders
                    .read(&status_filter(&format!("status-{caller}")))
                    .unwrap();
                assert!(records.is_empty());
            });
        }
    });

    assert_eq!(orders.cache().compile_count(), 1);
    assert_eq!(orders.cache().len(), 1);
}

#[test]
fn compile_failure_is_not_cached_and_can_succeed_later() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let model = orders_model();
    let orders = Cruder::new(Arc::clone(&db), Arc::new(model.clone()));

    let err = orders.read(&status_filter("a")).unwrap_err();
    match &err {
        CrudError::Compile { crud_type, sql, .. } => {
            assert_eq!(*crud_type, CrudType::Read);
            assert_eq!(sql, "SELECT * FROM \"orders\" WHERE \"status\" = ?");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(orders.cache().is_empty());
    assert_eq!(orders.cache().compile_count(), 0);

    schemacrud_core::db::ensure_table(&db, &model).unwrap();
    assert!(orders.read(&status_filter("a")).unwrap().is_empty());
    assert_eq!(orders.cache().compile_count(), 1);
}

#[test]
fn each_crud_type_gets_its_own_entry() {
    let orders = orders_cruder(Arc::new(Database::open_in_memory().unwrap()));
    let filter = status_filter("a");

    orders.read(&filter).unwrap();
    orders.remove(&filter).unwrap();
    orders
        .update(&CrudRequest::from_json(&json!({"status": "b", "where": {"status": "a"}})).unwrap())
        .unwrap();
    orders
        .update(&CrudRequest::from_json(&json!({"status": "c", "where": {"status": "b"}})).unwrap())
        .unwrap();

    assert_eq!(orders.cache().len(), 3);
    assert_eq!(orders.cache().compile_count(), 3);
}
