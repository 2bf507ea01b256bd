//! Dashboard and reports aggregates

use axum::{Extension, Json};
use chrono::Utc;
use crm_common::analytics::{dashboard, DashboardSummary};
use crm_common::backend::{fetch_all, Query};
use crm_common::model::{Call, Campaign, Deal, Lead, Table, Task};

use super::auth::RequestContext;
use crate::error::ApiResult;

/// GET /api/dashboard
///
/// Aggregates over whatever rows the caller can see.
pub async fn get_dashboard(
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<DashboardSummary>> {
    let backend = ctx.backend.as_ref();
    let all = Query::new();

    let (leads, deals, tasks, campaigns, calls) = tokio::try_join!(
        fetch_all::<Lead>(backend, Table::Leads, &all),
        fetch_all::<Deal>(backend, Table::Deals, &all),
        fetch_all::<Task>(backend, Table::Tasks, &all),
        fetch_all::<Campaign>(backend, Table::Campaigns, &all),
        fetch_all::<Call>(backend, Table::Calls, &all),
    )?;

    Ok(Json(dashboard(
        &leads,
        &deals,
        &tasks,
        &campaigns,
        &calls,
        Utc::now(),
    )))
}
