//! Segment rule evaluator
//!
//! A segment is a list of `(field, operator, value)` conditions combined
//! with ALL/ANY semantics. Evaluation is a plain synchronous filter over
//! subscriber rows already in memory; nothing is indexed and membership is
//! recomputed from scratch on every call.
//!
//! Conventions:
//! - Text comparisons are case-insensitive.
//! - A missing or null field never satisfies a positive operator, and
//!   always satisfies its negation.
//! - Conditions with a blank field name are still being authored and are
//!   skipped. A segment with no usable conditions matches everyone.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    Includes,
    Excludes,
    Before,
    After,
    WithinDays,
    NotWithinDays,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRules {
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Accept `"30"` or `30` for condition values
fn value_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Evaluate one condition against one record
pub fn matches(record: &Value, condition: &Condition, now: DateTime<Utc>) -> bool {
    let field = record.get(condition.field.as_str()).filter(|v| !v.is_null());
    let expected = condition.value.trim().to_lowercase();

    match condition.operator {
        Operator::Contains => text_of(field).is_some_and(|t| t.contains(&expected)),
        Operator::NotContains => !text_of(field).is_some_and(|t| t.contains(&expected)),
        Operator::Equals => equals(field, &expected),
        Operator::NotEquals => !equals(field, &expected),
        Operator::StartsWith => text_of(field).is_some_and(|t| t.starts_with(&expected)),
        Operator::EndsWith => text_of(field).is_some_and(|t| t.ends_with(&expected)),
        Operator::Includes => includes(field, &expected),
        Operator::Excludes => !includes(field, &expected),
        Operator::Before => match (field.and_then(date_of), parse_date(&condition.value)) {
            (Some(actual), Some(bound)) => actual < bound,
            _ => false,
        },
        Operator::After => match (field.and_then(date_of), parse_date(&condition.value)) {
            (Some(actual), Some(bound)) => actual > bound,
            _ => false,
        },
        Operator::WithinDays => within_days(field, &condition.value, now),
        Operator::NotWithinDays => !within_days(field, &condition.value, now),
    }
}

/// Evaluate a full rule set against one record
pub fn evaluate(rules: &SegmentRules, record: &Value, now: DateTime<Utc>) -> bool {
    let mut active = rules
        .conditions
        .iter()
        .filter(|c| !c.field.trim().is_empty())
        .peekable();

    if active.peek().is_none() {
        return true;
    }

    match rules.match_type {
        MatchType::All => active.all(|c| matches(record, c, now)),
        MatchType::Any => active.any(|c| matches(record, c, now)),
    }
}

/// Number of records the rules select
pub fn count_matches<'a, I>(rules: &SegmentRules, records: I, now: DateTime<Utc>) -> usize
where
    I: IntoIterator<Item = &'a Value>,
{
    records
        .into_iter()
        .filter(|r| evaluate(rules, r, now))
        .count()
}

fn text_of(field: Option<&Value>) -> Option<String> {
    match field? {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn equals(field: Option<&Value>, expected: &str) -> bool {
    match field {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .any(|t| t.trim() == expected),
        Some(value) => scalar_text(value).is_some_and(|t| t.trim() == expected),
        None => false,
    }
}

fn includes(field: Option<&Value>, expected: &str) -> bool {
    match field {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .any(|t| t.trim() == expected),
        Some(Value::String(s)) => s
            .split(',')
            .any(|part| part.trim().to_lowercase() == expected),
        _ => false,
    }
}

fn within_days(field: Option<&Value>, days: &str, now: DateTime<Utc>) -> bool {
    let Ok(days) = days.trim().parse::<i64>() else {
        return false;
    };
    match field.and_then(date_of) {
        Some(actual) => actual >= now - Duration::days(days) && actual <= now,
        None => false,
    }
}

fn date_of(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_date)
}

/// RFC 3339 timestamp or bare `yyyy-MM-dd` (midnight UTC)
pub(crate) fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
