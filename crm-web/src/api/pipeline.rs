//! Deal pipeline board

use axum::{Extension, Json};
use crm_common::pipeline::{DropTarget, PipelineBoard, StageColumn, StageMove};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::RequestContext;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub columns: Vec<StageColumn>,
    pub total_deals: usize,
}

/// GET /api/pipeline
pub async fn get_pipeline(
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<PipelineResponse>> {
    let board = PipelineBoard::load(ctx.backend.as_ref()).await?;
    Ok(Json(PipelineResponse {
        total_deals: board.deals().len(),
        columns: board.columns(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub deal_id: Uuid,
    pub target: DropTarget,
}

/// POST /api/pipeline/move
///
/// Resolves the drop target against the current board and persists only
/// the deal's stage.
pub async fn move_deal(
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<Json<StageMove>> {
    let mut board = PipelineBoard::load(ctx.backend.as_ref()).await?;
    let stage_move = board
        .commit_drop(ctx.backend.as_ref(), request.deal_id, request.target)
        .await?;
    Ok(Json(stage_move))
}
