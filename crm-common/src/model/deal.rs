//! Deals and the six pipeline stages

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Pipeline stage; the only deal field with workflow semantics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    #[default]
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    /// Board column order
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Lead => "lead",
            DealStage::Qualified => "qualified",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DealStage::Lead => "Lead",
            DealStage::Qualified => "Qualified",
            DealStage::Proposal => "Proposal",
            DealStage::Negotiation => "Negotiation",
            DealStage::ClosedWon => "Closed Won",
            DealStage::ClosedLost => "Closed Lost",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStage {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DealStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("unknown deal stage '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub stage: DealStage,
    /// Win probability in percent (0-100)
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Value scaled by win probability; closed-won counts in full, closed-lost as zero
    pub fn weighted_value(&self) -> f64 {
        match self.stage {
            DealStage::ClosedWon => self.value,
            DealStage::ClosedLost => 0.0,
            _ => self.value * self.probability.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wire_names() {
        assert_eq!(serde_json::to_string(&DealStage::ClosedWon).unwrap(), "\"closed_won\"");
        assert_eq!("negotiation".parse::<DealStage>().unwrap(), DealStage::Negotiation);
        assert!("won".parse::<DealStage>().is_err());
    }

    #[test]
    fn test_weighted_value() {
        let mut deal: Deal = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Renewal",
            "value": 1000.0,
            "stage": "proposal",
            "probability": 40,
            "created_at": "2024-05-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(deal.weighted_value(), 400.0);

        deal.stage = DealStage::ClosedLost;
        assert_eq!(deal.weighted_value(), 0.0);
    }
}
