//! Bearer-token authentication middleware
//!
//! The backend owns sessions. The middleware only asks it who the token
//! belongs to, loads that user's roles and hands handlers a backend client
//! scoped to the token so row-level security applies to every call.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use crm_common::backend::Backend;
use crm_common::permissions::UserContext;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Per-request identity, inserted as a request extension
#[derive(Clone)]
pub struct RequestContext {
    pub access_token: String,
    pub user: UserContext,
    /// Backend acting as the signed-in user
    pub backend: Arc<dyn Backend>,
}

impl RequestContext {
    /// Fail with 403 unless `allowed`
    pub fn require(&self, allowed: bool, action: &str) -> Result<(), ApiError> {
        if allowed {
            Ok(())
        } else {
            warn!(user = %self.user.user.id, action, "Permission denied");
            Err(ApiError::Forbidden(format!("Your role does not allow {}", action)))
        }
    }
}

/// `Authorization: Bearer <token>` value, if present and non-empty
pub fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
///
/// Returns 401 when the token is missing or the backend does not recognise it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let user = state
        .backend
        .current_user(&token)
        .await
        .require("user")
        .map_err(|e| {
            debug!(error = %e, "Token rejected by backend");
            ApiError::Unauthorized("Invalid or expired session".to_string())
        })?;

    let backend = state.backend.scoped(&token);
    let user = UserContext::load(backend.as_ref(), user).await?;

    request.extensions_mut().insert(RequestContext {
        access_token: token,
        user,
        backend,
    });

    Ok(next.run(request).await)
}
