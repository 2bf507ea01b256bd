//! Signed-in user

use axum::{Extension, Json};
use crm_common::permissions::UserContext;

use super::auth::RequestContext;

/// GET /api/me
pub async fn get_me(Extension(ctx): Extension<RequestContext>) -> Json<UserContext> {
    Json(ctx.user)
}
