//! CSV import wizard endpoints
//!
//! The service keeps no wizard state between requests: each step re-sends
//! the file text (and the mapping once the user has edited it) and the
//! wizard is replayed up to that step.

use axum::{extract::{Path, State}, Extension, Json};
use crm_common::import::{
    ColumnMapping, ImportEntity, ImportSummary, ImportWizard, PreviewRow,
};
use serde::{Deserialize, Serialize};

use super::auth::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub csv: String,
    /// Edited mapping; absent means the auto-suggested one
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    #[serde(default)]
    pub preview_rows: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    pub entity: ImportEntity,
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub fields: Vec<FieldInfo>,
    pub missing_required: Vec<&'static str>,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub row_count: usize,
    pub rows: Vec<PreviewRow>,
}

fn parse_entity(name: &str) -> ApiResult<ImportEntity> {
    name.parse::<ImportEntity>()
        .map_err(|_| ApiError::NotFound(format!("Cannot import into '{}'", name)))
}

/// Replay upload + mapping; optionally pass the required-field gate
fn replay(entity: ImportEntity, request: &ImportRequest, confirm: bool) -> ApiResult<ImportWizard> {
    let mut wizard = ImportWizard::new(entity);
    wizard.upload(&request.csv)?;
    if let Some(mapping) = &request.mapping {
        wizard.replace_mapping(mapping.clone())?;
    }
    if confirm {
        wizard.confirm_mapping()?;
    }
    Ok(wizard)
}

/// POST /api/import/:entity/mapping
pub async fn import_mapping(
    Path(entity): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<MappingResponse>> {
    let entity = parse_entity(&entity)?;
    let wizard = replay(entity, &request, false)?;

    Ok(Json(MappingResponse {
        entity,
        headers: wizard.headers().to_vec(),
        mapping: wizard.mapping().clone(),
        fields: entity
            .fields()
            .iter()
            .map(|f| FieldInfo {
                name: f.name,
                label: f.label,
                required: f.required,
            })
            .collect(),
        missing_required: wizard
            .mapping()
            .missing_required(entity)
            .iter()
            .map(|f| f.name)
            .collect(),
        row_count: wizard.row_count(),
    }))
}

/// POST /api/import/:entity/preview
pub async fn import_preview(
    Path(entity): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let entity = parse_entity(&entity)?;
    let wizard = replay(entity, &request, true)?;
    let rows = wizard.preview(request.preview_rows.unwrap_or(DEFAULT_PREVIEW_ROWS))?;
    Ok(Json(PreviewResponse {
        row_count: wizard.row_count(),
        rows,
    }))
}

/// POST /api/import/:entity/commit
///
/// Rows are inserted one request at a time; a partial failure still answers 200
/// with the mixed counts.
pub async fn import_commit(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(entity): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportSummary>> {
    let entity = parse_entity(&entity)?;
    let mut wizard = replay(entity, &request, true)?.with_error_limit(state.config.import_error_limit);
    let summary = wizard.commit(ctx.backend.as_ref()).await?;
    Ok(Json(summary))
}
