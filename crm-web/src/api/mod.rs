//! HTTP API handlers for crm-web

pub mod audit;
pub mod auth;
pub mod calls;
pub mod chat;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod import;
pub mod me;
pub mod pipeline;
pub mod records;
pub mod segments;
pub mod tasks;

pub use audit::export_audit_log;
pub use auth::auth_middleware;
pub use calls::list_calls;
pub use chat::chat_stream;
pub use dashboard::get_dashboard;
pub use export::export_entity;
pub use health::health_routes;
pub use import::{import_commit, import_mapping, import_preview};
pub use me::get_me;
pub use pipeline::{get_pipeline, move_deal};
pub use records::{create_record, delete_record, get_record, list_records, update_record};
pub use segments::{count_segment, preview_segment};
pub use tasks::list_tasks;
