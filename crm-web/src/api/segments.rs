//! Segment audience previews
//!
//! Membership is evaluated here against the subscriber list each time;
//! nothing is stored.

use axum::{extract::Path, Extension, Json};
use chrono::Utc;
use crm_common::backend::{self, Query};
use crm_common::model::{Segment, Table};
use crm_common::segment::{count_matches, SegmentRules};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::auth::RequestContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct SegmentCount {
    pub matching: usize,
    pub total: usize,
}

async fn count_subscribers(ctx: &RequestContext, rules: &SegmentRules) -> ApiResult<SegmentCount> {
    let subscribers: Vec<Value> =
        backend::fetch_all(ctx.backend.as_ref(), Table::Subscribers, &Query::new()).await?;
    Ok(SegmentCount {
        matching: count_matches(rules, &subscribers, Utc::now()),
        total: subscribers.len(),
    })
}

/// POST /api/segments/preview
///
/// Live count while the rules are being edited.
pub async fn preview_segment(
    Extension(ctx): Extension<RequestContext>,
    Json(rules): Json<SegmentRules>,
) -> ApiResult<Json<SegmentCount>> {
    Ok(Json(count_subscribers(&ctx, &rules).await?))
}

/// GET /api/segments/:id/count
pub async fn count_segment(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SegmentCount>> {
    let id = id
        .parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", id)))?;
    let segment: Segment = backend::fetch_one(ctx.backend.as_ref(), Table::Segments, id).await?;
    Ok(Json(count_subscribers(&ctx, &segment.rules()).await?))
}
