//! Task list with related-record labels

use axum::{extract::Query, Extension, Json};
use chrono::Utc;
use crm_common::backend::{fetch_all, Query as BackendQuery, SortOrder};
use crm_common::model::{Company, Contact, Deal, Lead, RelatedKind, RelatedLookup, Table, Task};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::RequestContext;
use crate::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
pub struct TaskParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub overdue_only: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    /// Display name of the linked lead, contact, deal or company
    pub related_label: Option<String>,
    pub overdue: bool,
}

fn ids_of(tasks: &[Task], kind: RelatedKind) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = tasks
        .iter()
        .filter_map(|t| t.related_to())
        .filter(|r| r.kind == kind)
        .map(|r| r.id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

async fn fetch_related<T: serde::de::DeserializeOwned>(
    ctx: &RequestContext,
    table: Table,
    ids: Vec<Uuid>,
) -> ApiResult<Vec<T>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let query = BackendQuery::new().in_list("id", ids.iter().map(Uuid::to_string));
    Ok(fetch_all(ctx.backend.as_ref(), table, &query).await?)
}

/// GET /api/tasks
///
/// Ordered by due date, undated tasks last.
pub async fn list_tasks(
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<TaskParams>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let mut query = BackendQuery::new().order("due_date", SortOrder::Asc);
    if let Some(status) = &params.status {
        query = query.eq("status", status.as_str());
    }
    if let Some(priority) = &params.priority {
        query = query.eq("priority", priority.as_str());
    }
    let tasks: Vec<Task> = fetch_all(ctx.backend.as_ref(), Table::Tasks, &query).await?;

    let leads: Vec<Lead> = fetch_related(&ctx, Table::Leads, ids_of(&tasks, RelatedKind::Lead)).await?;
    let contacts: Vec<Contact> =
        fetch_related(&ctx, Table::Contacts, ids_of(&tasks, RelatedKind::Contact)).await?;
    let deals: Vec<Deal> = fetch_related(&ctx, Table::Deals, ids_of(&tasks, RelatedKind::Deal)).await?;
    let companies: Vec<Company> =
        fetch_related(&ctx, Table::Companies, ids_of(&tasks, RelatedKind::Company)).await?;
    let lookup = RelatedLookup::from_rows(&leads, &contacts, &deals, &companies);

    let today = Utc::now().date_naive();
    let views = tasks
        .into_iter()
        .map(|task| {
            let related_label = task
                .related_to()
                .and_then(|r| lookup.label(&r).map(str::to_string));
            let overdue = task.is_overdue(today);
            TaskView {
                task,
                related_label,
                overdue,
            }
        })
        .filter(|view| !params.overdue_only || view.overdue)
        .collect();

    Ok(Json(views))
}
