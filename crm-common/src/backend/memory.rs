//! In-process backend
//!
//! Interprets [`Query`] over JSON rows held in memory. Used by the test
//! suites and by the service's offline demo mode. Constraint violations
//! are simulated with [`MemoryBackend::reject`].

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::query::literal;
use super::{AuthUser, Backend, BackendError, BackendResponse, Filter, Query, SortOrder};
use crate::model::Table;

/// Mutation kinds a rejection rule can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct Rejection {
    table: Table,
    operation: Operation,
    field: String,
    value: Value,
    message: String,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    users: RwLock<HashMap<String, AuthUser>>,
    rejections: RwLock<Vec<Rejection>>,
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an access token for a user
    pub async fn add_user(&self, access_token: &str, user: AuthUser) {
        self.inner
            .users
            .write()
            .await
            .insert(access_token.to_string(), user);
    }

    /// Seed rows directly (no id/timestamp defaults, no rejection rules)
    pub async fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        self.inner
            .tables
            .write()
            .await
            .entry(table)
            .or_default()
            .extend(rows);
    }

    /// Fail `operation` on `table` whenever the affected row has `field == value`
    pub async fn reject(
        &self,
        table: Table,
        operation: Operation,
        field: &str,
        value: impl Into<Value>,
        message: &str,
    ) {
        self.inner.rejections.write().await.push(Rejection {
            table,
            operation,
            field: field.to_string(),
            value: value.into(),
            message: message.to_string(),
        });
    }

    /// Snapshot of a table's rows
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.inner
            .tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    async fn rejection_for(&self, table: Table, operation: Operation, row: &Value) -> Option<BackendError> {
        self.inner
            .rejections
            .read()
            .await
            .iter()
            .find(|r| {
                r.table == table
                    && r.operation == operation
                    && row.get(&r.field).is_some_and(|v| loose_eq(v, &r.value))
            })
            .map(|r| BackendError::new(r.message.clone()).with_code("23514"))
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    a == b || literal(a) == literal(b)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => literal(x).cmp(&literal(y)),
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(col, v) => row.get(col).is_some_and(|x| loose_eq(x, v)),
        Filter::In(col, values) => row
            .get(col)
            .is_some_and(|x| values.iter().any(|v| loose_eq(x, v))),
        Filter::Gte(col, v) => row
            .get(col)
            .filter(|x| !x.is_null())
            .is_some_and(|x| compare_values(Some(x), Some(v)) != Ordering::Less),
        Filter::Lte(col, v) => row
            .get(col)
            .filter(|x| !x.is_null())
            .is_some_and(|x| compare_values(Some(x), Some(v)) != Ordering::Greater),
        Filter::IsNull(col, null) => row.get(col).map_or(true, Value::is_null) == *null,
        Filter::Search(cols, term) => {
            let term = term.to_lowercase();
            cols.iter().any(|c| {
                row.get(c)
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.to_lowercase().contains(&term))
            })
        }
    }
}

fn project(row: &Value, columns: &Option<Vec<String>>) -> Value {
    match (columns, row.as_object()) {
        (Some(cols), Some(fields)) => Value::Object(
            cols.iter()
                .filter_map(|c| fields.get(c).map(|v| (c.clone(), v.clone())))
                .collect::<Map<String, Value>>(),
        ),
        _ => row.clone(),
    }
}

fn id_matches(row: &Value, id: Uuid) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id.to_string().as_str())
}

fn not_found(table: Table, id: Uuid) -> BackendError {
    BackendError::new(format!("No {} row with id {}", table, id)).with_code("PGRST116")
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> BackendResponse<Vec<Value>> {
        let tables = self.inner.tables.read().await;
        let mut rows: Vec<&Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
                    .collect()
            })
            .unwrap_or_default();

        for (column, order) in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        BackendResponse::ok(
            rows.into_iter()
                .skip(offset)
                .take(limit)
                .map(|row| project(row, &query.columns))
                .collect(),
        )
    }

    async fn count(&self, table: Table, query: &Query) -> BackendResponse<u64> {
        let tables = self.inner.tables.read().await;
        let count = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| row_matches(row, f)))
                    .count()
            })
            .unwrap_or(0);
        BackendResponse::ok(count as u64)
    }

    async fn insert(&self, table: Table, row: Value) -> BackendResponse<Value> {
        let Value::Object(mut fields) = row else {
            return BackendResponse::err(BackendError::new("Row must be an object").with_code("22P02"));
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let row = Value::Object(fields);

        if let Some(error) = self.rejection_for(table, Operation::Insert, &row).await {
            return BackendResponse::err(error);
        }

        self.inner
            .tables
            .write()
            .await
            .entry(table)
            .or_default()
            .push(row.clone());
        BackendResponse::ok(row)
    }

    async fn update(&self, table: Table, id: Uuid, patch: Value) -> BackendResponse<Value> {
        let Value::Object(patch) = patch else {
            return BackendResponse::err(BackendError::new("Patch must be an object").with_code("22P02"));
        };

        let current = {
            let tables = self.inner.tables.read().await;
            tables
                .get(&table)
                .and_then(|rows| rows.iter().find(|row| id_matches(row, id)).cloned())
        };
        let Some(mut updated) = current else {
            return BackendResponse::err(not_found(table, id));
        };
        if let Some(fields) = updated.as_object_mut() {
            for (key, value) in patch {
                fields.insert(key, value);
            }
        }

        if let Some(error) = self.rejection_for(table, Operation::Update, &updated).await {
            return BackendResponse::err(error);
        }

        let mut tables = self.inner.tables.write().await;
        if let Some(slot) = tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|row| id_matches(row, id)))
        {
            *slot = updated.clone();
        }
        BackendResponse::ok(updated)
    }

    async fn delete(&self, table: Table, id: Uuid) -> BackendResponse<()> {
        let current = {
            let tables = self.inner.tables.read().await;
            tables
                .get(&table)
                .and_then(|rows| rows.iter().find(|row| id_matches(row, id)).cloned())
        };
        let Some(row) = current else {
            return BackendResponse::err(not_found(table, id));
        };
        if let Some(error) = self.rejection_for(table, Operation::Delete, &row).await {
            return BackendResponse::err(error);
        }

        if let Some(rows) = self.inner.tables.write().await.get_mut(&table) {
            rows.retain(|row| !id_matches(row, id));
        }
        BackendResponse::ok(())
    }

    async fn current_user(&self, access_token: &str) -> BackendResponse<AuthUser> {
        match self.inner.users.read().await.get(access_token) {
            Some(user) => BackendResponse::ok(user.clone()),
            None => BackendResponse::err(BackendError::new("Invalid or expired token").with_code("401")),
        }
    }

    fn scoped(&self, _access_token: &str) -> Arc<dyn Backend> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Table::Leads, json!({"first_name": "Ada"}))
            .await
            .require("lead")
            .unwrap();
        assert!(row["id"].as_str().and_then(|s| s.parse::<Uuid>().ok()).is_some());
        assert!(row["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_pages() {
        let backend = MemoryBackend::new();
        backend
            .seed(
                Table::Deals,
                vec![
                    json!({"id": Uuid::new_v4().to_string(), "title": "B", "value": 200, "stage": "lead"}),
                    json!({"id": Uuid::new_v4().to_string(), "title": "A", "value": 50, "stage": "lead"}),
                    json!({"id": Uuid::new_v4().to_string(), "title": "C", "value": 900, "stage": "proposal"}),
                ],
            )
            .await;

        let query = Query::new()
            .eq("stage", "lead")
            .order("value", SortOrder::Desc)
            .limit(1);
        let rows = backend.select(Table::Deals, &query).await.require("deals").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "B");

        let count = backend.count(Table::Deals, &query).await.require("count").unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let backend = MemoryBackend::new();
        backend
            .seed(Table::Companies, vec![json!({"name": "Acme, Inc."}), json!({"name": "Globex"})])
            .await;
        let rows = backend
            .select(Table::Companies, &Query::new().search(&["name"], "ACME"))
            .await
            .require("companies")
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_rule() {
        let backend = MemoryBackend::new();
        backend
            .reject(Table::Leads, Operation::Insert, "email", "dup@example.com", "duplicate key")
            .await;
        let response = backend
            .insert(Table::Leads, json!({"first_name": "X", "email": "dup@example.com"}))
            .await;
        assert!(response.into_result().is_err());
        assert!(backend.rows(Table::Leads).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_error() {
        let backend = MemoryBackend::new();
        let response = backend
            .update(Table::Deals, Uuid::new_v4(), json!({"stage": "qualified"}))
            .await;
        assert!(response.into_result().is_err());
    }
}
