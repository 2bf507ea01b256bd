//! Generic record API: paginated lists, single rows and form submissions
//!
//! One set of handlers serves every table. Lists support free-text search
//! over the table's search columns, sorting and `column=value` equality
//! filters; mutations run local validation before any request is sent.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use crm_common::backend::{self, Query as BackendQuery, SortOrder};
use crm_common::model::{validate_record, Table, ValidationMode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::auth::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageWindow, PAGE_SIZE};

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct RecordsPage {
    pub table: String,
    pub total_rows: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub rows: Vec<Value>,
}

/// Query keys with a meaning of their own; any other key is an equality filter
const RESERVED_PARAMS: [&str; 4] = ["page", "search", "sort", "order"];

/// Column names reach the backend as query keys
fn is_valid_column_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_table(name: &str) -> ApiResult<Table> {
    name.parse::<Table>()
        .map_err(|_| ApiError::NotFound(format!("Unknown table: {}", name)))
}

fn parse_id(id: &str) -> ApiResult<Uuid> {
    id.parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", id)))
}

/// Build the backend query (filters + sort) from list parameters
pub fn list_query(table: Table, params: &HashMap<String, String>) -> ApiResult<BackendQuery> {
    let mut query = BackendQuery::new();

    if let Some(term) = params.get("search") {
        query = query.search(table.search_columns(), term);
    }

    let mut filters: Vec<(&String, &String)> = params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
        .collect();
    filters.sort();
    for (column, value) in filters {
        if !is_valid_column_name(column) {
            return Err(ApiError::BadRequest(format!("Invalid filter column: {}", column)));
        }
        query = query.eq(column.as_str(), value.as_str());
    }

    let sort = params.get("sort").map(String::as_str).unwrap_or("created_at");
    if !is_valid_column_name(sort) {
        return Err(ApiError::BadRequest(format!("Invalid column: {}", sort)));
    }
    let order = match params.get("order") {
        Some(order) => SortOrder::parse_lenient(order),
        None if params.contains_key("sort") => SortOrder::Asc,
        None => SortOrder::Desc,
    };
    Ok(query.order(sort, order))
}

/// GET /api/records/:table
pub async fn list_records(
    Extension(ctx): Extension<RequestContext>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<RecordsPage>> {
    let table = parse_table(&table)?;
    let requested_page = match params.get("page") {
        Some(page) => page
            .parse::<u64>()
            .map_err(|_| ApiError::BadRequest(format!("Invalid page: {}", page)))?,
        None => 1,
    };

    let query = list_query(table, &params)?;
    let total_rows = ctx
        .backend
        .count(table, &query)
        .await
        .into_result()?
        .unwrap_or(0);

    let window = PageWindow::locate(total_rows, requested_page);
    let query = window.apply(query);
    let rows = ctx
        .backend
        .select(table, &query)
        .await
        .into_result()?
        .unwrap_or_default();

    Ok(Json(RecordsPage {
        table: table.to_string(),
        total_rows,
        page: window.number,
        page_size: PAGE_SIZE,
        total_pages: window.page_count,
        rows,
    }))
}

/// GET /api/records/:table/:id
pub async fn get_record(
    Extension(ctx): Extension<RequestContext>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let table = parse_table(&table)?;
    let id = parse_id(&id)?;
    let row: Value = backend::fetch_one(ctx.backend.as_ref(), table, id).await?;
    Ok(Json(row))
}

/// Role gates on top of the backend's own checks
fn check_write_permission(ctx: &RequestContext, table: Table) -> ApiResult<()> {
    let permissions = ctx.user.permissions;
    match table {
        Table::Campaigns => ctx.require(permissions.can_create_campaign, "managing campaigns"),
        Table::UserRoles | Table::Profiles => ctx.require(permissions.can_manage_users, "managing users"),
        _ => Ok(()),
    }
}

/// POST /api/records/:table
pub async fn create_record(
    Extension(ctx): Extension<RequestContext>,
    Path(table): Path<String>,
    Json(record): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let table = parse_table(&table)?;
    validate_record(table, &record, ValidationMode::Create)?;
    check_write_permission(&ctx, table)?;

    let row = backend::insert_row(ctx.backend.as_ref(), table, record).await?;
    info!(table = %table, user = %ctx.user.user.id, "Record created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/records/:table/:id
pub async fn update_record(
    Extension(ctx): Extension<RequestContext>,
    Path((table, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Value>> {
    let table = parse_table(&table)?;
    let id = parse_id(&id)?;
    validate_record(table, &patch, ValidationMode::Update)?;
    check_write_permission(&ctx, table)?;

    let row = backend::update_row(ctx.backend.as_ref(), table, id, patch).await?;
    info!(table = %table, id = %id, "Record updated");
    Ok(Json(row))
}

/// DELETE /api/records/:table/:id
pub async fn delete_record(
    Extension(ctx): Extension<RequestContext>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let table = parse_table(&table)?;
    let id = parse_id(&id)?;
    if table.is_read_only() {
        return Err(ApiError::BadRequest(format!("{} is read-only", table)));
    }
    ctx.require(ctx.user.permissions.can_delete, "deleting records")?;

    backend::delete_row(ctx.backend.as_ref(), table, id).await?;
    info!(table = %table, id = %id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_common::backend::Filter;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_list_query_defaults_to_newest_first() {
        let query = list_query(Table::Leads, &params(&[])).unwrap();
        assert_eq!(query.order, vec![("created_at".to_string(), SortOrder::Desc)]);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_list_query_filters_and_search() {
        let query = list_query(
            Table::Leads,
            &params(&[("status", "new"), ("search", "acme"), ("sort", "score"), ("page", "2")]),
        )
        .unwrap();
        assert_eq!(query.filters.len(), 2);
        assert!(query.filters.contains(&Filter::Eq("status".to_string(), "new".into())));
        assert_eq!(query.order, vec![("score".to_string(), SortOrder::Asc)]);
    }

    #[test]
    fn test_list_query_rejects_bad_columns() {
        assert!(list_query(Table::Leads, &params(&[("status;drop", "x")])).is_err());
        assert!(list_query(Table::Leads, &params(&[("sort", "a b")])).is_err());
    }
}
