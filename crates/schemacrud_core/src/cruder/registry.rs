//! One `Cruder` per model plus `/<model>/<crud>` route resolution.

use super::{CrudError, CrudOutcome, CrudResult, Cruder};
use crate::db::{ensure_tables, Database, DbResult};
use crate::query::CrudType;
use crate::request::CrudRequest;
use crate::schema::Model;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/([A-Za-z_][A-Za-z0-9_]*)/(create|read|update|delete)/?$")
        .expect("valid route regex")
});

/// Executors for every loaded model, sharing one database handle.
pub struct CruderRegistry {
    db: Arc<Database>,
    cruders: BTreeMap<String, Cruder>,
}

impl CruderRegistry {
    pub fn new(db: Arc<Database>, models: Vec<Model>) -> Self {
        let cruders = models
            .into_iter()
            .map(|model| {
                let name = model.name().to_string();
                (name, Cruder::new(Arc::clone(&db), Arc::new(model)))
            })
            .collect();
        Self { db, cruders }
    }

    /// Creates tables for models that have none yet; returns created names.
    pub fn ensure_tables(&self) -> DbResult<Vec<String>> {
        ensure_tables(&self.db, self.cruders.values().map(Cruder::model))
    }

    pub fn get(&self, model: &str) -> Option<&Cruder> {
        self.cruders.get(model)
    }

    /// Model names in sorted order.
    pub fn model_names(&self) -> Vec<&str> {
        self.cruders.keys().map(String::as_str).collect()
    }

    /// Resolves `/users/read` style paths to a cruder and crud type.
    pub fn resolve_route(&self, path: &str) -> Option<(&Cruder, CrudType)> {
        let captures = ROUTE_RE.captures(path)?;
        let cruder = self.get(captures.get(1)?.as_str())?;
        let crud_type = CrudType::parse(captures.get(2)?.as_str())?;
        Some((cruder, crud_type))
    }

    /// Canonicalizes `body` and runs `crud_type` on `model`.
    pub fn dispatch(
        &self,
        model: &str,
        crud_type: CrudType,
        body: &serde_json::Value,
    ) -> CrudResult<CrudOutcome> {
        let cruder = self
            .get(model)
            .ok_or_else(|| CrudError::UnknownModel(model.to_string()))?;
        let request = CrudRequest::from_json(body)?;
        cruder.execute(crud_type, &request)
    }

    /// Same as [`CruderRegistry::dispatch`] with a `/<model>/<crud>` path.
    pub fn dispatch_path(&self, path: &str, body: &serde_json::Value) -> CrudResult<CrudOutcome> {
        let (cruder, crud_type) = self
            .resolve_route(path)
            .ok_or_else(|| CrudError::UnknownRoute(path.to_string()))?;
        let request = CrudRequest::from_json(body)?;
        cruder.execute(crud_type, &request)
    }
}

#[cfg(test)]
mod tests {
    use super::CruderRegistry;
    use crate::db::Database;
    use crate::query::CrudType;
    use crate::schema::{load, ModelSpec};
    use std::sync::Arc;

    fn registry() -> CruderRegistry {
        let models = load(vec![
            ModelSpec::new("users", [("id", "INTEGER"), ("name", "VARCHAR")]),
            ModelSpec::new("orders", [("id", "INTEGER"), ("status", "VARCHAR")]),
        ])
        .unwrap();
        CruderRegistry::new(Arc::new(Database::open_in_memory().unwrap()), models)
    }

    #[test]
    fn resolves_known_routes_only() {
        let registry = registry();
        let (cruder, crud_type) = registry.resolve_route("/users/read").unwrap();
        assert_eq!(cruder.model().name(), "users");
        assert_eq!(crud_type, CrudType::Read);

        assert!(registry.resolve_route("/orders/delete/").is_some());
        assert!(registry.resolve_route("/invoices/read").is_none());
        assert!(registry.resolve_route("/users/remove").is_none());
        assert!(registry.resolve_route("users/read").is_none());
    }

    #[test]
    fn ensure_tables_creates_each_table_once() {
        let registry = registry();
        assert_eq!(registry.ensure_tables().unwrap(), vec!["orders", "users"]);
        assert!(registry.ensure_tables().unwrap().is_empty());
        assert_eq!(registry.model_names(), vec!["orders", "users"]);
    }
}
