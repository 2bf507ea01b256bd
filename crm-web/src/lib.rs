//! crm-web library - CRM application service
//!
//! JSON endpoints in front of the managed backend: record lists and forms,
//! the deal pipeline board, CSV import/export, segment previews, dashboards,
//! audit export and the AI assistant relay. Every `/api` request carries the
//! caller's bearer token, which is forwarded so the backend's row-level
//! security applies.

use axum::Router;
use crm_common::backend::Backend;
use crm_common::chat::ChatClient;
use crm_common::config::CrmConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod demo;
pub mod error;
pub mod logging;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Backend client acting with the anon key; handlers use the per-request scoped copy
    pub backend: Arc<dyn Backend>,
    /// Assistant endpoint client (None disables `/api/chat`)
    pub chat: Option<ChatClient>,
    pub config: Arc<CrmConfig>,
}

impl AppState {
    /// Create new application state
    pub fn new(backend: Arc<dyn Backend>, config: CrmConfig) -> Self {
        Self {
            backend,
            chat: None,
            config: Arc::new(config),
        }
    }

    pub fn with_chat(mut self, chat: ChatClient) -> Self {
        self.chat = Some(chat);
        self
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/me", get(api::get_me))
        .route(
            "/api/records/:table",
            get(api::list_records).post(api::create_record),
        )
        .route(
            "/api/records/:table/:id",
            get(api::get_record)
                .patch(api::update_record)
                .delete(api::delete_record),
        )
        .route("/api/pipeline", get(api::get_pipeline))
        .route("/api/pipeline/move", post(api::move_deal))
        .route("/api/import/:entity/mapping", post(api::import_mapping))
        .route("/api/import/:entity/preview", post(api::import_preview))
        .route("/api/import/:entity/commit", post(api::import_commit))
        .route("/api/export/:entity", get(api::export_entity))
        .route("/api/segments/preview", post(api::preview_segment))
        .route("/api/segments/:id/count", get(api::count_segment))
        .route("/api/tasks", get(api::list_tasks))
        .route("/api/calls", get(api::list_calls))
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/api/audit-logs/export", get(api::export_audit_log))
        .route("/api/chat", post(api::chat_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = api::health_routes();

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
