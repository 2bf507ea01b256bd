//! Call log: history and reminders

use axum::{Extension, Json};
use chrono::Utc;
use crm_common::backend::{fetch_all, Query};
use crm_common::model::{partition_calls, Call, CallPartition, Table};

use super::auth::RequestContext;
use crate::error::ApiResult;

/// GET /api/calls
pub async fn list_calls(Extension(ctx): Extension<RequestContext>) -> ApiResult<Json<CallPartition>> {
    let calls: Vec<Call> = fetch_all(ctx.backend.as_ref(), Table::Calls, &Query::new()).await?;
    Ok(Json(partition_calls(calls, Utc::now())))
}
