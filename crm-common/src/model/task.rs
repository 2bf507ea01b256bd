//! Tasks and their polymorphic "related to" reference
//!
//! On the wire a task points at a lead, contact, deal or company through a
//! `related_to_type` + `related_to_id` pair rather than a foreign key. In
//! code that pair is the tagged union [`RelatedTo`], and display labels are
//! resolved through a [`RelatedLookup`] keyed by kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Company, Contact, Deal, Lead, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Kind half of a related-to reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedKind {
    Lead,
    Contact,
    Deal,
    Company,
}

impl RelatedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedKind::Lead => "lead",
            RelatedKind::Contact => "contact",
            RelatedKind::Deal => "deal",
            RelatedKind::Company => "company",
        }
    }

    /// Table the referenced row lives in
    pub fn table(&self) -> Table {
        match self {
            RelatedKind::Lead => Table::Leads,
            RelatedKind::Contact => Table::Contacts,
            RelatedKind::Deal => Table::Deals,
            RelatedKind::Company => Table::Companies,
        }
    }
}

impl fmt::Display for RelatedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelatedKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(RelatedKind::Lead),
            "contact" => Ok(RelatedKind::Contact),
            "deal" => Ok(RelatedKind::Deal),
            "company" => Ok(RelatedKind::Company),
            other => Err(crate::Error::Validation(format!(
                "unknown related_to_type '{}'",
                other
            ))),
        }
    }
}

/// Typed reference to the record a task is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedTo {
    pub kind: RelatedKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    related_to_type: Option<String>,
    #[serde(default)]
    related_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Typed view of the wire pair; `None` if either half is missing or unknown
    pub fn related_to(&self) -> Option<RelatedTo> {
        let kind = self.related_to_type.as_deref()?.parse().ok()?;
        let id = self.related_to_id?;
        Some(RelatedTo { kind, id })
    }

    pub fn set_related_to(&mut self, related: Option<RelatedTo>) {
        self.related_to_type = related.map(|r| r.kind.as_str().to_string());
        self.related_to_id = related.map(|r| r.id);
    }

    /// Open task whose due date lies before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < today)
    }
}

/// Display labels for related-to references, keyed by kind and id
#[derive(Debug, Clone, Default)]
pub struct RelatedLookup {
    labels: HashMap<RelatedKind, HashMap<Uuid, String>>,
}

impl RelatedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the lookup from already-fetched rows
    pub fn from_rows(leads: &[Lead], contacts: &[Contact], deals: &[Deal], companies: &[Company]) -> Self {
        let mut lookup = Self::new();
        for lead in leads {
            lookup.insert(RelatedKind::Lead, lead.id, lead.display_name());
        }
        for contact in contacts {
            lookup.insert(RelatedKind::Contact, contact.id, contact.display_name());
        }
        for deal in deals {
            lookup.insert(RelatedKind::Deal, deal.id, deal.title.clone());
        }
        for company in companies {
            lookup.insert(RelatedKind::Company, company.id, company.name.clone());
        }
        lookup
    }

    pub fn insert(&mut self, kind: RelatedKind, id: Uuid, label: String) {
        self.labels.entry(kind).or_default().insert(id, label);
    }

    pub fn label(&self, related: &RelatedTo) -> Option<&str> {
        self.labels
            .get(&related.kind)
            .and_then(|by_id| by_id.get(&related.id))
            .map(String::as_str)
    }
}
