//! Row types for the backend tables
//!
//! Every row is owned and validated by the backend. The types here are
//! transient per-request copies; nothing is cached between requests.

pub mod activity;
pub mod call;
pub mod campaign;
pub mod company;
pub mod deal;
pub mod lead;
pub mod task;
pub mod validation;

pub use activity::{Activity, AppRole, AuditLog, Notification, Profile, UserRole};
pub use call::{partition_calls, Call, CallDirection, CallKind, CallPartition, CallStatus};
pub use campaign::{
    Campaign, CampaignStatus, CampaignType, EmailTemplate, Segment, Subscriber, SubscriberStatus,
};
pub use company::{Company, Contact};
pub use deal::{Deal, DealStage};
pub use lead::{Lead, LeadSource, LeadStatus};
pub use task::{RelatedKind, RelatedLookup, RelatedTo, Task, TaskPriority, TaskStatus};
pub use validation::{validate_record, Mode as ValidationMode};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named backend tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Leads,
    Deals,
    Contacts,
    Companies,
    Tasks,
    Campaigns,
    Subscribers,
    Segments,
    Calls,
    Activities,
    AuditLogs,
    Profiles,
    UserRoles,
    Notifications,
    EmailTemplates,
}

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Leads,
        Table::Deals,
        Table::Contacts,
        Table::Companies,
        Table::Tasks,
        Table::Campaigns,
        Table::Subscribers,
        Table::Segments,
        Table::Calls,
        Table::Activities,
        Table::AuditLogs,
        Table::Profiles,
        Table::UserRoles,
        Table::Notifications,
        Table::EmailTemplates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Leads => "leads",
            Table::Deals => "deals",
            Table::Contacts => "contacts",
            Table::Companies => "companies",
            Table::Tasks => "tasks",
            Table::Campaigns => "campaigns",
            Table::Subscribers => "subscribers",
            Table::Segments => "segments",
            Table::Calls => "calls",
            Table::Activities => "activities",
            Table::AuditLogs => "audit_logs",
            Table::Profiles => "profiles",
            Table::UserRoles => "user_roles",
            Table::Notifications => "notifications",
            Table::EmailTemplates => "email_templates",
        }
    }

    /// Backend-written, append-only tables the client only displays
    pub fn is_read_only(&self) -> bool {
        matches!(self, Table::Activities | Table::AuditLogs)
    }

    /// Columns searched by the free-text box on list views
    pub fn search_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Leads => &["first_name", "last_name", "email", "company_name"],
            Table::Contacts => &["first_name", "last_name", "email", "phone"],
            Table::Companies => &["name", "industry", "website"],
            Table::Deals => &["title"],
            Table::Tasks => &["title", "description"],
            Table::Campaigns => &["name", "subject"],
            Table::Subscribers => &["email", "first_name", "last_name"],
            Table::Segments => &["name", "description"],
            Table::Calls => &["phone_number", "notes"],
            Table::Activities => &["description"],
            Table::AuditLogs => &["action", "entity_type"],
            Table::Profiles => &["full_name", "email"],
            Table::UserRoles => &["role"],
            Table::Notifications => &["title", "message"],
            Table::EmailTemplates => &["name", "subject"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::NotFound(format!("table '{}'", s)))
    }
}
