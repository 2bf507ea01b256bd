//! Calls and call reminders
//!
//! The `calls` table holds both completed-call history and future
//! reminders. A row is a reminder only through its nullable `scheduled_at`.
//! [`Call::kind`] makes that distinction explicit instead of leaving every
//! caller to re-derive it:
//!
//! - `scheduled_at` null, or status other than `scheduled` → history
//! - status `scheduled` and `scheduled_at` in the future → upcoming reminder
//! - status `scheduled` and `scheduled_at` now or past → due reminder
//!   (still shown with reminders until someone logs the call)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    #[default]
    Outbound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Completed,
    Missed,
    Voicemail,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub phone_number: String,
    #[serde(default)]
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub direction: CallDirection,
    #[serde(default)]
    pub status: CallStatus,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    History,
    UpcomingReminder,
    DueReminder,
}

impl Call {
    pub fn kind(&self, now: DateTime<Utc>) -> CallKind {
        match (self.status, self.scheduled_at) {
            (CallStatus::Scheduled, Some(at)) if at > now => CallKind::UpcomingReminder,
            (CallStatus::Scheduled, Some(_)) => CallKind::DueReminder,
            _ => CallKind::History,
        }
    }
}

/// Calls split into history and reminders
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallPartition {
    /// Most recent first
    pub history: Vec<Call>,
    /// Soonest first; due reminders sort ahead of upcoming ones
    pub reminders: Vec<Call>,
}

pub fn partition_calls(calls: Vec<Call>, now: DateTime<Utc>) -> CallPartition {
    let (mut reminders, mut history): (Vec<Call>, Vec<Call>) = calls
        .into_iter()
        .partition(|call| call.kind(now) != CallKind::History);

    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    reminders.sort_by_key(|call| call.scheduled_at);

    CallPartition { history, reminders }
}
