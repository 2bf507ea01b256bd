//! Audit log filtering and CSV export

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::backend::{fetch_all, Backend, Query, SortOrder};
use crate::csv;
use crate::export::EXPORT_ROW_LIMIT;
use crate::model::{AuditLog, Profile, Table};
use crate::Result;

pub const AUDIT_CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "User",
    "Action",
    "Entity Type",
    "Entity ID",
    "Details",
    "IP Address",
];

/// Filters applied to fetched log entries; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<Uuid>,
    /// Inclusive start day (UTC)
    pub from: Option<NaiveDate>,
    /// Inclusive end day (UTC)
    pub to: Option<NaiveDate>,
    /// Case-insensitive text over action, entity type, entity id and details
    pub search: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        if let Some(action) = self.action.as_deref().filter(|a| !a.is_empty()) {
            if !log.action.eq_ignore_ascii_case(action) {
                return false;
            }
        }
        if let Some(entity_type) = self.entity_type.as_deref().filter(|e| !e.is_empty()) {
            if !log.entity_type.eq_ignore_ascii_case(entity_type) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if log.user_id != Some(user_id) {
                return false;
            }
        }
        let day = log.created_at.date_naive();
        if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let haystack = [
                log.action.clone(),
                log.entity_type.clone(),
                log.entity_id.clone().unwrap_or_default(),
                log.details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
            ];
            if !haystack.iter().any(|h| h.to_lowercase().contains(&term)) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, logs: &'a [AuditLog]) -> Vec<&'a AuditLog> {
        logs.iter().filter(|log| self.matches(log)).collect()
    }
}

/// `audit-logs-<yyyy-MM-dd>.csv`
pub fn audit_filename(date: NaiveDate) -> String {
    format!("audit-logs-{}.csv", date.format("%Y-%m-%d"))
}

/// Render entries with the fixed seven-column header
///
/// `user_names` maps user ids to display names; unknown users show their id,
/// entries without a user show `System`.
pub fn audit_csv(logs: &[&AuditLog], user_names: &HashMap<Uuid, String>) -> Result<String> {
    let rows: Vec<Vec<String>> = logs
        .iter()
        .map(|log| {
            let user = match log.user_id {
                Some(id) => user_names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| id.to_string()),
                None => "System".to_string(),
            };
            vec![
                log.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                user,
                log.action.clone(),
                log.entity_type.clone(),
                log.entity_id.clone().unwrap_or_default(),
                log.details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
                log.ip_address.clone().unwrap_or_default(),
            ]
        })
        .collect();
    csv::write(&AUDIT_CSV_HEADER, &rows)
}

/// Fetch the newest entries, filter them and resolve user names
pub async fn export_audit_logs(
    backend: &dyn Backend,
    filter: &AuditFilter,
    today: NaiveDate,
) -> Result<(String, String)> {
    let mut query = Query::new()
        .order("created_at", SortOrder::Desc)
        .limit(EXPORT_ROW_LIMIT);
    if let Some(from) = filter.from {
        query = query.gte("created_at", from.and_time(NaiveTime::default()).and_utc().to_rfc3339());
    }
    // Bound the window server-side so the row cap applies inside it
    if let Some(next_day) = filter.to.and_then(|to| to.succ_opt()) {
        query = query.lte("created_at", next_day.and_time(NaiveTime::default()).and_utc().to_rfc3339());
    }
    let logs = fetch_all::<AuditLog>(backend, Table::AuditLogs, &query).await?;
    let profiles = fetch_all::<Profile>(backend, Table::Profiles, &Query::new()).await?;
    let user_names: HashMap<Uuid, String> = profiles
        .iter()
        .map(|p| (p.id, p.display_name()))
        .collect();

    let selected = filter.apply(&logs);
    tracing::info!(total = logs.len(), exported = selected.len(), "Audit log export");
    Ok((audit_filename(today), audit_csv(&selected, &user_names)?))
}
