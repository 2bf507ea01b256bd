//! HTTP client for the hosted Postgres REST + auth endpoints

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{AuthUser, Backend, BackendError, BackendResponse, Query};
use crate::model::Table;
use crate::Result;

const USER_AGENT: &str = concat!("crm-common/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Backend client; cheap to clone, one per access token
#[derive(Clone)]
pub struct RestBackend {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, BackendError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Backend request failed");
            BackendError::new(format!("Network error: {}", e)).with_code("network")
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResponse<T> {
        match self.send(builder).await {
            Ok(response) => match response.json::<T>().await {
                Ok(data) => BackendResponse::ok(data),
                Err(e) => BackendResponse::err(
                    BackendError::new(format!("Malformed response: {}", e)).with_code("parse"),
                ),
            },
            Err(e) => BackendResponse::err(e),
        }
    }

    /// Mutations answer an array of affected rows; exactly one is expected
    async fn send_single(&self, builder: RequestBuilder) -> BackendResponse<Value> {
        match self.send_json::<Vec<Value>>(builder).await.into_result() {
            Ok(Some(rows)) if !rows.is_empty() => {
                BackendResponse::ok(rows.into_iter().next().unwrap_or(Value::Null))
            }
            Ok(_) => BackendResponse::err(
                BackendError::new("No rows found").with_code("PGRST116"),
            ),
            Err(crate::Error::Backend { message, code }) => BackendResponse::err(BackendError {
                message,
                code,
                details: None,
                hint: None,
            }),
            Err(e) => BackendResponse::err(BackendError::new(e.to_string())),
        }
    }
}

/// Decode a non-2xx response body into the backend's error shape
async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let mut error = serde_json::from_str::<BackendError>(&body).unwrap_or_else(|_| {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error_description")
                    .or_else(|| v.get("msg"))
                    .or_else(|| v.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("Request failed").to_string()
                } else {
                    body.clone()
                }
            });
        BackendError::new(message)
    });

    if error.code.is_none() {
        error.code = Some(status.as_u16().to_string());
    }
    tracing::debug!(status = %status, code = ?error.code, "Backend rejected request");
    error
}

/// Total from a `Content-Range: 0-24/1234` (or `*/1234`) header
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, table: Table, query: &Query) -> BackendResponse<Vec<Value>> {
        tracing::debug!(table = %table, "select");
        let builder = self
            .request(Method::GET, &self.table_url(table))
            .query(&query.to_params());
        self.send_json(builder).await
    }

    async fn count(&self, table: Table, query: &Query) -> BackendResponse<u64> {
        let builder = self
            .request(Method::HEAD, &self.table_url(table))
            .header("Prefer", "count=exact")
            .query(&query.filters_only().to_params());

        match self.send(builder).await {
            Ok(response) => {
                let total = response
                    .headers()
                    .get(header::CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range);
                match total {
                    Some(total) => BackendResponse::ok(total),
                    None => BackendResponse::err(
                        BackendError::new("Missing Content-Range in count response").with_code("parse"),
                    ),
                }
            }
            Err(e) => BackendResponse::err(e),
        }
    }

    async fn insert(&self, table: Table, row: Value) -> BackendResponse<Value> {
        tracing::debug!(table = %table, "insert");
        let builder = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        self.send_single(builder).await
    }

    async fn update(&self, table: Table, id: Uuid, patch: Value) -> BackendResponse<Value> {
        tracing::debug!(table = %table, id = %id, "update");
        let builder = self
            .request(Method::PATCH, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch);
        self.send_single(builder).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> BackendResponse<()> {
        tracing::debug!(table = %table, id = %id, "delete");
        let builder = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id))]);
        match self.send(builder).await {
            Ok(_) => BackendResponse::ok(()),
            Err(e) => BackendResponse::err(e),
        }
    }

    async fn current_user(&self, access_token: &str) -> BackendResponse<AuthUser> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let builder = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        match self.send(builder).await {
            Ok(response) => match response.json::<AuthUser>().await {
                Ok(user) => BackendResponse::ok(user),
                Err(e) => BackendResponse::err(BackendError::new(format!("Malformed user: {}", e))),
            },
            Err(e) => BackendResponse::err(e),
        }
    }

    fn scoped(&self, access_token: &str) -> Arc<dyn Backend> {
        Arc::new(Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range("0-24/1234"), Some(1234));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-24/*"), None);
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let backend = RestBackend::new("https://example.test/", "anon").unwrap();
        assert_eq!(backend.table_url(Table::AuditLogs), "https://example.test/rest/v1/audit_logs");
    }
}
