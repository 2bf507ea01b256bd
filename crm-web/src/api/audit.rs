//! Audit log export

use axum::{extract::Query, response::Response, Extension};
use chrono::Utc;
use crm_common::audit::{export_audit_logs, AuditFilter};

use super::auth::RequestContext;
use super::export::csv_attachment;
use crate::error::ApiResult;

/// GET /api/audit-logs/export
///
/// Query parameters map onto [`AuditFilter`]; `from`/`to` are `YYYY-MM-DD`.
pub async fn export_audit_log(
    Extension(ctx): Extension<RequestContext>,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<Response> {
    ctx.require(ctx.user.permissions.can_view_audit_log, "viewing the audit log")?;
    let (filename, content) =
        export_audit_logs(ctx.backend.as_ref(), &filter, Utc::now().date_naive()).await?;
    Ok(csv_attachment(&filename, content))
}
