//! Typed access to the managed backend
//!
//! Every backend call answers `{ data, error }`. A non-null `error` is a
//! failure to surface, never a partial success, even when `data` is also
//! present. [`BackendResponse::into_result`] is the single place that rule
//! lives.
//!
//! Two implementations share the [`Backend`] trait: [`RestBackend`] speaks
//! the hosted Postgres REST dialect over HTTP, [`MemoryBackend`] interprets
//! the same [`Query`] in-process for tests and offline demos.

pub mod memory;
pub mod query;
pub mod rest;

pub use memory::{MemoryBackend, Operation};
pub use query::{Filter, Query, SortOrder};
pub use rest::RestBackend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::Table;
use crate::{Error, Result};

/// Error payload reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            hint: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend {
            message: e.message,
            code: e.code,
        }
    }
}

/// `{ data, error }` envelope returned by every backend call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse<T> {
    pub data: Option<T>,
    pub error: Option<BackendError>,
}

impl<T> BackendResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: BackendError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    /// Any error wins over any data
    pub fn into_result(self) -> Result<Option<T>> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.data),
        }
    }

    /// Like `into_result`, but null data is `NotFound(what)`
    pub fn require(self, what: &str) -> Result<T> {
        self.into_result()?
            .ok_or_else(|| Error::NotFound(what.to_string()))
    }
}

/// Signed-in user as reported by the backend's auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Query/insert/update/delete client against named tables
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> BackendResponse<Vec<Value>>;

    /// Number of rows matching the query's filters (ordering and paging ignored)
    async fn count(&self, table: Table, query: &Query) -> BackendResponse<u64>;

    /// Insert one row; answers the row as stored
    async fn insert(&self, table: Table, row: Value) -> BackendResponse<Value>;

    /// Patch the row with `id`; answers the row as stored
    async fn update(&self, table: Table, id: Uuid, patch: Value) -> BackendResponse<Value>;

    async fn delete(&self, table: Table, id: Uuid) -> BackendResponse<()>;

    /// Resolve an access token to the user it belongs to
    async fn current_user(&self, access_token: &str) -> BackendResponse<AuthUser>;

    /// Same backend, acting on behalf of the token's user (row-level security applies)
    fn scoped(&self, access_token: &str) -> Arc<dyn Backend>;
}

/// Select rows and deserialize them
pub async fn fetch_all<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    query: &Query,
) -> Result<Vec<T>> {
    let rows = backend
        .select(table, query)
        .await
        .into_result()?
        .unwrap_or_default();
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Error::from))
        .collect()
}

/// Fetch a single row by id
pub async fn fetch_one<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: Table,
    id: Uuid,
) -> Result<T> {
    let query = Query::new().eq("id", id.to_string()).limit(1);
    let row = backend
        .select(table, &query)
        .await
        .into_result()?
        .and_then(|rows| rows.into_iter().next())
        .ok_or_else(|| Error::NotFound(format!("{} {}", table, id)))?;
    Ok(serde_json::from_value(row)?)
}

pub async fn insert_row(backend: &dyn Backend, table: Table, row: Value) -> Result<Value> {
    backend.insert(table, row).await.require(table.as_str())
}

pub async fn update_row(backend: &dyn Backend, table: Table, id: Uuid, patch: Value) -> Result<Value> {
    backend
        .update(table, id, patch)
        .await
        .require(&format!("{} {}", table, id))
}

pub async fn delete_row(backend: &dyn Backend, table: Table, id: Uuid) -> Result<()> {
    backend.delete(table, id).await.into_result()?;
    Ok(())
}
