//! CSV export downloads

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use crm_common::export::{export_csv, ExportEntity};
use serde::Deserialize;

use super::auth::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    /// Comma-separated field names; absent or empty means every field
    #[serde(default)]
    pub fields: Option<String>,
}

/// `text/csv` attachment response
pub fn csv_attachment(filename: &str, content: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response()
}

/// GET /api/export/:entity?fields=a,b
pub async fn export_entity(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(entity): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let entity = entity
        .parse::<ExportEntity>()
        .map_err(|_| ApiError::NotFound(format!("Cannot export '{}'", entity)))?;
    ctx.require(ctx.user.permissions.can_export, "exporting data")?;

    let fields: Vec<&str> = params
        .fields
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    let export = export_csv(
        ctx.backend.as_ref(),
        entity,
        &fields,
        Utc::now().date_naive(),
        state.config.export_row_limit,
    )
    .await?;

    Ok(csv_attachment(&export.filename, export.content))
}
