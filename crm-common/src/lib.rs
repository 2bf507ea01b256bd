//! # CRM Common Library
//!
//! Shared code for the CRM application layer including:
//! - Row types for the backend tables and local validation
//! - The backend client contract (`{ data, error }`) with REST and in-memory implementations
//! - CSV codec, import wizard and export
//! - Segment rule evaluation, pipeline reassignment and dashboard aggregates
//! - AI chat stream decoding
//! - Configuration loading

pub mod analytics;
pub mod audit;
pub mod backend;
pub mod chat;
pub mod config;
pub mod csv;
pub mod error;
pub mod export;
pub mod human_time;
pub mod import;
pub mod model;
pub mod permissions;
pub mod pipeline;
pub mod segment;

pub use error::{Error, Result};
