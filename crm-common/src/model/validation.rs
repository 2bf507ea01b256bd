//! Form validation run before any request is sent
//!
//! A failure here blocks the mutation locally; the backend still enforces
//! its own constraints and row-level security on whatever gets through.

use serde_json::{Map, Value};

use super::{DealStage, Table};
use crate::segment::SegmentRules;
use crate::{Error, Result};

/// Create checks required fields; update checks only the fields present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// Validate a create/update payload for `table`
pub fn validate_record(table: Table, record: &Value, mode: Mode) -> Result<()> {
    let fields = record
        .as_object()
        .ok_or_else(|| Error::Validation("record must be a JSON object".to_string()))?;

    if table.is_read_only() {
        return Err(Error::Validation(format!("{} is read-only", table)));
    }

    match table {
        Table::Leads => {
            required_text(fields, "first_name", "Lead name", mode)?;
            email_format(fields, "email")?;
            number_range(fields, "score", 0.0, 100.0)?;
        }
        Table::Contacts => {
            required_text(fields, "first_name", "First name", mode)?;
            email_format(fields, "email")?;
        }
        Table::Companies => {
            required_text(fields, "name", "Company name", mode)?;
            number_range(fields, "employee_count", 0.0, f64::MAX)?;
        }
        Table::Deals => {
            required_text(fields, "title", "Deal title", mode)?;
            number_range(fields, "value", 0.0, f64::MAX)?;
            number_range(fields, "probability", 0.0, 100.0)?;
            if let Some(stage) = fields.get("stage").and_then(Value::as_str) {
                stage.parse::<DealStage>()?;
            }
        }
        Table::Tasks => required_text(fields, "title", "Task title", mode)?,
        Table::Campaigns => required_text(fields, "name", "Campaign name", mode)?,
        Table::EmailTemplates => required_text(fields, "name", "Template name", mode)?,
        Table::Subscribers => {
            required_text(fields, "email", "Email", mode)?;
            email_format(fields, "email")?;
        }
        Table::Segments => {
            required_text(fields, "name", "Segment name", mode)?;
            if fields.contains_key("conditions") || fields.contains_key("match_type") {
                let rules = Value::Object(
                    fields
                        .iter()
                        .filter(|(k, _)| k.as_str() == "conditions" || k.as_str() == "match_type")
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                );
                serde_json::from_value::<SegmentRules>(rules)
                    .map_err(|e| Error::Validation(format!("Invalid segment rules: {}", e)))?;
            }
        }
        Table::Calls => required_text(fields, "phone_number", "Phone number", mode)?,
        Table::Notifications | Table::Profiles | Table::UserRoles => {}
        Table::Activities | Table::AuditLogs => {}
    }

    Ok(())
}

fn required_text(fields: &Map<String, Value>, key: &str, label: &str, mode: Mode) -> Result<()> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        None if mode == Mode::Update => Ok(()),
        _ => Err(Error::Validation(format!("{} is required", label))),
    }
}

fn email_format(fields: &Map<String, Value>, key: &str) -> Result<()> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let s = s.trim();
            match s.split_once('@') {
                Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
                _ => Err(Error::Validation(format!("'{}' is not a valid email", s))),
            }
        }
        _ => Ok(()),
    }
}

fn number_range(fields: &Map<String, Value>, key: &str, min: f64, max: f64) -> Result<()> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Number(n)) => {
            let v = n.as_f64().unwrap_or(f64::NAN);
            if v >= min && v <= max {
                Ok(())
            } else {
                Err(Error::Validation(format!("{} is out of range", key)))
            }
        }
        Some(_) => Err(Error::Validation(format!("{} must be a number", key))),
    }
}
