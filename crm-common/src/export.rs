//! CSV export of one entity's rows
//!
//! The whole result set is fetched (up to [`EXPORT_ROW_LIMIT`] rows) and
//! rendered in memory; there is no streaming.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::backend::{Backend, Query, SortOrder};
use crate::csv;
use crate::model::Table;
use crate::{Error, Result};

/// Maximum rows selected for one export
pub const EXPORT_ROW_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportEntity {
    Leads,
    Contacts,
    Companies,
    Deals,
    Tasks,
    Subscribers,
}

/// `(field, header label)` pairs in column order
type FieldList = &'static [(&'static str, &'static str)];

impl ExportEntity {
    pub const ALL: [ExportEntity; 6] = [
        ExportEntity::Leads,
        ExportEntity::Contacts,
        ExportEntity::Companies,
        ExportEntity::Deals,
        ExportEntity::Tasks,
        ExportEntity::Subscribers,
    ];

    pub fn table(&self) -> Table {
        match self {
            ExportEntity::Leads => Table::Leads,
            ExportEntity::Contacts => Table::Contacts,
            ExportEntity::Companies => Table::Companies,
            ExportEntity::Deals => Table::Deals,
            ExportEntity::Tasks => Table::Tasks,
            ExportEntity::Subscribers => Table::Subscribers,
        }
    }

    pub fn fields(&self) -> FieldList {
        match self {
            ExportEntity::Leads => &[
                ("first_name", "First Name"),
                ("last_name", "Last Name"),
                ("email", "Email"),
                ("phone", "Phone"),
                ("company_name", "Company"),
                ("job_title", "Job Title"),
                ("source", "Source"),
                ("status", "Status"),
                ("score", "Score"),
                ("notes", "Notes"),
                ("created_at", "Created At"),
            ],
            ExportEntity::Contacts => &[
                ("first_name", "First Name"),
                ("last_name", "Last Name"),
                ("email", "Email"),
                ("phone", "Phone"),
                ("job_title", "Job Title"),
                ("notes", "Notes"),
                ("created_at", "Created At"),
            ],
            ExportEntity::Companies => &[
                ("name", "Company Name"),
                ("industry", "Industry"),
                ("website", "Website"),
                ("phone", "Phone"),
                ("address", "Address"),
                ("city", "City"),
                ("country", "Country"),
                ("employee_count", "Employees"),
                ("annual_revenue", "Annual Revenue"),
                ("created_at", "Created At"),
            ],
            ExportEntity::Deals => &[
                ("title", "Deal Title"),
                ("value", "Value"),
                ("stage", "Stage"),
                ("probability", "Probability"),
                ("expected_close_date", "Expected Close Date"),
                ("notes", "Notes"),
                ("created_at", "Created At"),
            ],
            ExportEntity::Tasks => &[
                ("title", "Title"),
                ("description", "Description"),
                ("due_date", "Due Date"),
                ("priority", "Priority"),
                ("status", "Status"),
                ("related_to_type", "Related To"),
                ("created_at", "Created At"),
            ],
            ExportEntity::Subscribers => &[
                ("email", "Email"),
                ("first_name", "First Name"),
                ("last_name", "Last Name"),
                ("status", "Status"),
                ("tags", "Tags"),
                ("source", "Source"),
                ("created_at", "Created At"),
            ],
        }
    }

    /// Field names in column order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields().iter().map(|(name, _)| *name).collect()
    }

    fn label(&self, field: &str) -> Option<&'static str> {
        self.fields()
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, label)| *label)
    }
}

impl fmt::Display for ExportEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().as_str())
    }
}

impl FromStr for ExportEntity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExportEntity::ALL
            .iter()
            .copied()
            .find(|e| e.table().as_str() == s)
            .ok_or_else(|| Error::NotFound(format!("export entity '{}'", s)))
    }
}

/// Rendered export ready for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
    pub row_count: usize,
}

/// `<entity>-export-<yyyy-MM-dd>.csv`
pub fn export_filename(entity: ExportEntity, date: NaiveDate) -> String {
    format!("{}-export-{}.csv", entity, date.format("%Y-%m-%d"))
}

/// Text for one cell; arrays are joined with `; `, null is empty
pub fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| render_cell(Some(item)))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    }
}

/// Render already-fetched rows; `fields` must all belong to `entity`
pub fn render_rows(entity: ExportEntity, fields: &[&str], rows: &[Value]) -> Result<String> {
    let headers = fields
        .iter()
        .map(|f| {
            entity.label(f).ok_or_else(|| {
                Error::Validation(format!("'{}' is not an exportable {} field", f, entity))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| fields.iter().map(|f| render_cell(row.get(*f))).collect())
        .collect();

    csv::write(&headers, &cells)
}

/// Fetch up to `limit` rows (newest first) and render the chosen fields
///
/// An empty field selection exports every field.
pub async fn export_csv(
    backend: &dyn Backend,
    entity: ExportEntity,
    fields: &[&str],
    today: NaiveDate,
    limit: usize,
) -> Result<CsvExport> {
    let fields: Vec<&str> = if fields.is_empty() {
        entity.field_names()
    } else {
        fields.to_vec()
    };

    // Reject unknown fields before any request goes out
    render_rows(entity, &fields, &[])?;

    let query = Query::new()
        .select(fields.iter().copied())
        .order("created_at", SortOrder::Desc)
        .limit(limit.min(EXPORT_ROW_LIMIT));
    let rows = backend
        .select(entity.table(), &query)
        .await
        .into_result()?
        .unwrap_or_default();

    let content = render_rows(entity, &fields, &rows)?;
    info!(entity = %entity, rows = rows.len(), "Export rendered");

    Ok(CsvExport {
        filename: export_filename(entity, today),
        content,
        row_count: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(ExportEntity::Leads, date), "leads-export-2024-03-09.csv");
    }

    #[test]
    fn test_render_cells() {
        assert_eq!(render_cell(None), "");
        assert_eq!(render_cell(Some(&json!(null))), "");
        assert_eq!(render_cell(Some(&json!(42.5))), "42.5");
        assert_eq!(render_cell(Some(&json!(true))), "true");
        assert_eq!(render_cell(Some(&json!(["vip", "newsletter"]))), "vip; newsletter");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = render_rows(ExportEntity::Deals, &["title", "password"], &[]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_render_rows_uses_labels() {
        let out = render_rows(
            ExportEntity::Companies,
            &["name", "employee_count"],
            &[json!({"name": "Acme, Inc.", "employee_count": 12})],
        )
        .unwrap();
        assert_eq!(out, "Company Name,Employees\n\"Acme, Inc.\",12\n");
    }
}
