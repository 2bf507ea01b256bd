//! CSV import wizard
//!
//! Upload → map columns → preview → commit. Headers are matched to entity
//! fields automatically and the user may override any column. Commit sends
//! one insert per row, in file order, with no batching, rollback or
//! duplicate detection; per-row failures are counted and the first few are
//! reported back.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::csv::{self, CsvTable};
use crate::model::{validate_record, Table, ValidationMode};
use crate::{Error, Result};

/// Row error messages kept in an [`ImportSummary`]
pub const ERROR_DETAIL_LIMIT: usize = 5;

const LEAD_SOURCES: &[&str] = &[
    "website",
    "referral",
    "social_media",
    "email",
    "cold_call",
    "event",
    "other",
];
const LEAD_STATUSES: &[&str] = &["new", "contacted", "qualified", "unqualified", "converted"];
const DEAL_STAGES: &[&str] = &[
    "lead",
    "qualified",
    "proposal",
    "negotiation",
    "closed_won",
    "closed_lost",
];

/// How a cell is coerced before it is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Number,
    /// Normalised to `yyyy-MM-dd`
    Date,
    /// One of the listed wire values (after header-style normalisation)
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required: false,
        kind,
    }
}

const fn required(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required: true,
        kind: FieldKind::Text,
    }
}

const LEAD_FIELDS: &[FieldSpec] = &[
    required("first_name", "First Name"),
    field("last_name", "Last Name", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("phone", "Phone", FieldKind::Text),
    field("company_name", "Company", FieldKind::Text),
    field("job_title", "Job Title", FieldKind::Text),
    field("source", "Source", FieldKind::Enum(LEAD_SOURCES)),
    field("status", "Status", FieldKind::Enum(LEAD_STATUSES)),
    field("score", "Score", FieldKind::Integer),
    field("notes", "Notes", FieldKind::Text),
];

const CONTACT_FIELDS: &[FieldSpec] = &[
    required("first_name", "First Name"),
    field("last_name", "Last Name", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("phone", "Phone", FieldKind::Text),
    field("job_title", "Job Title", FieldKind::Text),
    field("notes", "Notes", FieldKind::Text),
];

const COMPANY_FIELDS: &[FieldSpec] = &[
    required("name", "Company Name"),
    field("industry", "Industry", FieldKind::Text),
    field("website", "Website", FieldKind::Text),
    field("phone", "Phone", FieldKind::Text),
    field("address", "Address", FieldKind::Text),
    field("city", "City", FieldKind::Text),
    field("country", "Country", FieldKind::Text),
    field("employee_count", "Employees", FieldKind::Integer),
    field("annual_revenue", "Annual Revenue", FieldKind::Number),
];

const DEAL_FIELDS: &[FieldSpec] = &[
    required("title", "Deal Title"),
    field("value", "Value", FieldKind::Number),
    field("stage", "Stage", FieldKind::Enum(DEAL_STAGES)),
    field("probability", "Probability", FieldKind::Number),
    field("expected_close_date", "Expected Close Date", FieldKind::Date),
    field("notes", "Notes", FieldKind::Text),
];

/// Entities the wizard can import into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportEntity {
    Leads,
    Contacts,
    Companies,
    Deals,
}

impl ImportEntity {
    pub const ALL: [ImportEntity; 4] = [
        ImportEntity::Leads,
        ImportEntity::Contacts,
        ImportEntity::Companies,
        ImportEntity::Deals,
    ];

    pub fn table(&self) -> Table {
        match self {
            ImportEntity::Leads => Table::Leads,
            ImportEntity::Contacts => Table::Contacts,
            ImportEntity::Companies => Table::Companies,
            ImportEntity::Deals => Table::Deals,
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            ImportEntity::Leads => LEAD_FIELDS,
            ImportEntity::Contacts => CONTACT_FIELDS,
            ImportEntity::Companies => COMPANY_FIELDS,
            ImportEntity::Deals => DEAL_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

impl fmt::Display for ImportEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().as_str())
    }
}

impl FromStr for ImportEntity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ImportEntity::ALL
            .iter()
            .copied()
            .find(|e| e.table().as_str() == s)
            .ok_or_else(|| Error::NotFound(format!("import entity '{}'", s)))
    }
}

/// Lowercase; runs of non-alphanumerics become a single `_`; no leading/trailing `_`
pub fn normalize_header(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Column index → target field; `None` skips the column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    targets: Vec<Option<String>>,
}

impl ColumnMapping {
    pub fn skip_all(columns: usize) -> Self {
        Self {
            targets: vec![None; columns],
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn target(&self, column: usize) -> Option<&str> {
        self.targets.get(column).and_then(|t| t.as_deref())
    }

    pub fn targets(&self) -> &[Option<String>] {
        &self.targets
    }

    /// Point a column at a field (or skip it); the field is released from any other column
    pub fn set(&mut self, entity: ImportEntity, column: usize, target: Option<&str>) -> Result<()> {
        if column >= self.targets.len() {
            return Err(Error::Validation(format!("No column {}", column)));
        }
        if let Some(name) = target {
            if entity.field(name).is_none() {
                return Err(Error::Validation(format!(
                    "'{}' is not a {} field",
                    name, entity
                )));
            }
            for other in self.targets.iter_mut() {
                if other.as_deref() == Some(name) {
                    *other = None;
                }
            }
        }
        self.targets[column] = target.map(str::to_string);
        Ok(())
    }

    /// Required fields of `entity` no column is mapped to
    pub fn missing_required(&self, entity: ImportEntity) -> Vec<&'static FieldSpec> {
        entity
            .fields()
            .iter()
            .filter(|f| f.required)
            .filter(|f| !self.targets.iter().any(|t| t.as_deref() == Some(f.name)))
            .collect()
    }

    fn validate_for(&self, entity: ImportEntity, columns: usize) -> Result<()> {
        if self.targets.len() != columns {
            return Err(Error::Validation(format!(
                "Mapping has {} columns, file has {}",
                self.targets.len(),
                columns
            )));
        }
        let mut seen = Vec::new();
        for name in self.targets.iter().flatten() {
            if entity.field(name).is_none() {
                return Err(Error::Validation(format!("'{}' is not a {} field", name, entity)));
            }
            if seen.contains(&name) {
                return Err(Error::Validation(format!("'{}' is mapped twice", name)));
            }
            seen.push(name);
        }
        Ok(())
    }
}

/// Guess a mapping for the uploaded headers
///
/// Passes run over all headers in turn, strongest first: exact field name,
/// label, underscore-free spelling, then containment either way. A field is
/// claimed by at most one column.
pub fn auto_map<S: AsRef<str>>(entity: ImportEntity, headers: &[S]) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
    let mut mapping = ColumnMapping::skip_all(headers.len());

    let passes: [fn(&str, &FieldSpec) -> bool; 4] = [
        |h, f| h == f.name,
        |h, f| h == normalize_header(f.label),
        |h, f| h.replace('_', "") == f.name.replace('_', ""),
        |h, f| h.len() >= 3 && (h.contains(f.name) || f.name.contains(h)),
    ];

    for pass in passes {
        for (column, header) in normalized.iter().enumerate() {
            if mapping.targets[column].is_some() || header.is_empty() {
                continue;
            }
            let claimed = entity.fields().iter().find(|f| {
                pass(header, f) && !mapping.targets.iter().any(|t| t.as_deref() == Some(f.name))
            });
            if let Some(spec) = claimed {
                mapping.targets[column] = Some(spec.name.to_string());
            }
        }
    }

    debug!(entity = %entity, mapped = mapping.targets.iter().flatten().count(), "Auto-mapped columns");
    mapping
}

/// Convert one cell; empty cells become null
pub fn coerce_cell(spec: &FieldSpec, raw: &str) -> Result<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }

    match spec.kind {
        FieldKind::Text => Ok(Value::String(text.to_string())),
        FieldKind::Number => {
            let n = parse_number(text)
                .ok_or_else(|| Error::Validation(format!("{} '{}' is not a number", spec.label, text)))?;
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| Error::Validation(format!("{} '{}' is not a number", spec.label, text)))
        }
        FieldKind::Integer => match parse_number(text) {
            Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(Value::from(n as i64)),
            _ => Err(Error::Validation(format!(
                "{} '{}' is not a whole number",
                spec.label, text
            ))),
        },
        FieldKind::Date => parse_import_date(text)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| Error::Validation(format!("{} '{}' is not a date", spec.label, text))),
        FieldKind::Enum(allowed) => {
            let value = normalize_header(text);
            if allowed.contains(&value.as_str()) {
                Ok(Value::String(value))
            } else {
                Err(Error::Validation(format!(
                    "{} '{}' must be one of: {}",
                    spec.label,
                    text,
                    allowed.join(", ")
                )))
            }
        }
    }
}

/// Strip currency symbols, spaces, thousands separators and a trailing `%`
fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '%') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_import_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.date_naive()))
}

/// Build the insert payload for one data row
pub fn build_record(entity: ImportEntity, mapping: &ColumnMapping, row: &[String]) -> Result<Value> {
    let mut record = Map::new();
    for (column, cell) in row.iter().enumerate() {
        let Some(spec) = mapping.target(column).and_then(|name| entity.field(name)) else {
            continue;
        };
        let value = coerce_cell(spec, cell)?;
        if value.is_null() {
            if spec.required {
                return Err(Error::Validation(format!("{} is required", spec.label)));
            }
            continue;
        }
        record.insert(spec.name.to_string(), value);
    }

    let record = Value::Object(record);
    validate_record(entity.table(), &record, ValidationMode::Create)?;
    Ok(record)
}

/// One coerced row shown before commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    /// 1-based data row number
    pub row: usize,
    pub record: Option<Value>,
    pub error: Option<String>,
}

/// Outcome of a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub success: usize,
    pub failed: usize,
    /// First failures as `Row <n>: <message>`
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn record_failure(&mut self, row: usize, message: &str, limit: usize) {
        self.failed += 1;
        if self.errors.len() < limit {
            self.errors.push(format!("Row {}: {}", row, message));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Upload,
    MapColumns,
    Preview,
    Commit,
    Done,
}

/// Linear import flow for one entity
#[derive(Debug, Clone)]
pub struct ImportWizard {
    entity: ImportEntity,
    step: ImportStep,
    table: CsvTable,
    mapping: ColumnMapping,
    error_limit: usize,
    summary: Option<ImportSummary>,
}

impl ImportWizard {
    pub fn new(entity: ImportEntity) -> Self {
        Self {
            entity,
            step: ImportStep::Upload,
            table: CsvTable::default(),
            mapping: ColumnMapping::default(),
            error_limit: ERROR_DETAIL_LIMIT,
            summary: None,
        }
    }

    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = limit;
        self
    }

    pub fn entity(&self) -> ImportEntity {
        self.entity
    }

    pub fn step(&self) -> ImportStep {
        self.step
    }

    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }

    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        self.summary.as_ref()
    }

    /// Parse the file and guess the mapping; restarts the wizard
    pub fn upload(&mut self, text: &str) -> Result<()> {
        let table = csv::parse(text)?;
        if table.is_empty() {
            return Err(Error::Validation("CSV file has no data rows".to_string()));
        }
        self.mapping = auto_map(self.entity, &table.headers);
        self.table = table;
        self.summary = None;
        self.step = ImportStep::MapColumns;
        info!(entity = %self.entity, rows = self.table.rows.len(), "CSV uploaded");
        Ok(())
    }

    fn require_step(&self, allowed: &[ImportStep]) -> Result<()> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "Import is at step {:?}",
                self.step
            )))
        }
    }

    pub fn set_mapping(&mut self, column: usize, target: Option<&str>) -> Result<()> {
        self.require_step(&[ImportStep::MapColumns, ImportStep::Preview])?;
        self.mapping.set(self.entity, column, target)?;
        self.step = ImportStep::MapColumns;
        Ok(())
    }

    /// Replace the whole mapping (e.g. one edited client-side)
    pub fn replace_mapping(&mut self, mapping: ColumnMapping) -> Result<()> {
        self.require_step(&[ImportStep::MapColumns, ImportStep::Preview])?;
        mapping.validate_for(self.entity, self.table.headers.len())?;
        self.mapping = mapping;
        self.step = ImportStep::MapColumns;
        Ok(())
    }

    /// Gate: every required field must be mapped
    pub fn confirm_mapping(&mut self) -> Result<()> {
        self.require_step(&[ImportStep::MapColumns, ImportStep::Preview])?;
        let missing = self.mapping.missing_required(self.entity);
        if !missing.is_empty() {
            let labels: Vec<&str> = missing.iter().map(|f| f.label).collect();
            return Err(Error::Validation(format!(
                "Map the required fields: {}",
                labels.join(", ")
            )));
        }
        self.step = ImportStep::Preview;
        Ok(())
    }

    /// First `n` rows as they would be sent
    pub fn preview(&self, n: usize) -> Result<Vec<PreviewRow>> {
        self.require_step(&[ImportStep::Preview])?;
        Ok(self
            .table
            .rows
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, row)| match build_record(self.entity, &self.mapping, row) {
                Ok(record) => PreviewRow {
                    row: i + 1,
                    record: Some(record),
                    error: None,
                },
                Err(e) => PreviewRow {
                    row: i + 1,
                    record: None,
                    error: Some(error_message(&e)),
                },
            })
            .collect())
    }

    /// Insert every row, one request at a time, in file order
    pub async fn commit(&mut self, backend: &dyn Backend) -> Result<ImportSummary> {
        self.require_step(&[ImportStep::Preview])?;
        self.step = ImportStep::Commit;

        let table = self.entity.table();
        let mut summary = ImportSummary::default();
        for (i, row) in self.table.rows.iter().enumerate() {
            let row_number = i + 1;
            let record = match build_record(self.entity, &self.mapping, row) {
                Ok(record) => record,
                Err(e) => {
                    summary.record_failure(row_number, &error_message(&e), self.error_limit);
                    continue;
                }
            };
            match backend.insert(table, record).await.into_result() {
                Ok(_) => summary.success += 1,
                Err(e) => {
                    debug!(table = %table, row = row_number, error = %e, "Import row rejected");
                    summary.record_failure(row_number, &error_message(&e), self.error_limit);
                }
            }
        }

        if summary.failed > 0 {
            warn!(entity = %self.entity, success = summary.success, failed = summary.failed, "Import finished with failures");
        } else {
            info!(entity = %self.entity, success = summary.success, "Import finished");
        }
        self.summary = Some(summary.clone());
        self.step = ImportStep::Done;
        Ok(summary)
    }
}

/// Message without the error-kind prefix
fn error_message(error: &Error) -> String {
    match error {
        Error::Validation(message) | Error::NotFound(message) => message.clone(),
        Error::Backend { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
