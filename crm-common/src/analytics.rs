//! Dashboard aggregates over fetched rows
//!
//! Pure functions; callers fetch the rows and pass them in. Percentages
//! are rounded to one decimal and a zero denominator yields 0.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::human_time;
use crate::model::{
    Call, CallStatus, Campaign, Deal, DealStage, Lead, LeadStatus, Task, TaskStatus,
};

/// `part / whole` as a percentage with one decimal
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub conversion_rate: f64,
}

pub fn lead_stats(leads: &[Lead]) -> LeadStats {
    let mut stats = LeadStats {
        total: leads.len(),
        ..LeadStats::default()
    };
    for lead in leads {
        *stats.by_status.entry(lead.status.as_str().to_string()).or_default() += 1;
        let source = lead.source.map(|s| s.as_str()).unwrap_or("unknown");
        *stats.by_source.entry(source.to_string()).or_default() += 1;
    }
    let converted = leads.iter().filter(|l| l.status == LeadStatus::Converted).count();
    stats.conversion_rate = percent(converted as f64, leads.len() as f64);
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTotal {
    pub stage: DealStage,
    pub count: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub stages: Vec<StageTotal>,
    /// Value of deals not yet closed
    pub open_value: f64,
    pub weighted_value: f64,
    pub won_value: f64,
    /// Won / (won + lost)
    pub win_rate: f64,
    pub average_deal_size: f64,
}

pub fn pipeline_stats(deals: &[Deal]) -> PipelineStats {
    let stages = DealStage::ALL
        .iter()
        .map(|&stage| {
            let in_stage = deals.iter().filter(|d| d.stage == stage);
            StageTotal {
                stage,
                count: in_stage.clone().count(),
                value: in_stage.map(|d| d.value).sum(),
            }
        })
        .collect();

    let open: Vec<&Deal> = deals.iter().filter(|d| !d.stage.is_closed()).collect();
    let won = deals.iter().filter(|d| d.stage == DealStage::ClosedWon).count();
    let lost = deals.iter().filter(|d| d.stage == DealStage::ClosedLost).count();
    let total_value: f64 = deals.iter().map(|d| d.value).sum();

    PipelineStats {
        stages,
        open_value: open.iter().map(|d| d.value).sum(),
        weighted_value: open.iter().map(|d| d.weighted_value()).sum(),
        won_value: deals
            .iter()
            .filter(|d| d.stage == DealStage::ClosedWon)
            .map(|d| d.value)
            .sum(),
        win_rate: percent(won as f64, (won + lost) as f64),
        average_deal_size: if deals.is_empty() {
            0.0
        } else {
            (total_value / deals.len() as f64 * 100.0).round() / 100.0
        },
    }
}

/// Won revenue per `yyyy-MM`, keyed by expected close date (creation date if unset)
pub fn monthly_won_revenue(deals: &[Deal]) -> BTreeMap<String, f64> {
    let mut months = BTreeMap::new();
    for deal in deals.iter().filter(|d| d.stage == DealStage::ClosedWon) {
        let date = deal
            .expected_close_date
            .unwrap_or_else(|| deal.created_at.date_naive());
        let key = format!("{:04}-{:02}", date.year(), date.month());
        *months.entry(key).or_insert(0.0) += deal.value;
    }
    months
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    pub completion_rate: f64,
}

pub fn task_stats(tasks: &[Task], today: NaiveDate) -> TaskStats {
    let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
    TaskStats {
        total: tasks.len(),
        completed,
        overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        completion_rate: percent(completed as f64, tasks.len() as f64),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignStats {
    pub total: usize,
    pub recipients: i64,
    pub open_rate: f64,
    pub click_rate: f64,
}

pub fn campaign_stats(campaigns: &[Campaign]) -> CampaignStats {
    let recipients: i64 = campaigns.iter().map(|c| c.recipients_count).sum();
    let opens: i64 = campaigns.iter().map(|c| c.opens_count).sum();
    let clicks: i64 = campaigns.iter().map(|c| c.clicks_count).sum();
    CampaignStats {
        total: campaigns.len(),
        recipients,
        open_rate: percent(opens as f64, recipients as f64),
        click_rate: percent(clicks as f64, recipients as f64),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallStats {
    pub total: usize,
    pub completed: usize,
    pub missed: usize,
    pub completion_rate: f64,
    /// Average over calls with a recorded duration, as `M:SS`
    pub average_duration: Option<String>,
}

pub fn call_stats(calls: &[Call]) -> CallStats {
    let completed = calls.iter().filter(|c| c.status == CallStatus::Completed).count();
    CallStats {
        total: calls.len(),
        completed,
        missed: calls.iter().filter(|c| c.status == CallStatus::Missed).count(),
        completion_rate: percent(completed as f64, calls.len() as f64),
        average_duration: human_time::average_duration(calls.iter().filter_map(|c| c.duration))
            .map(human_time::format_duration),
    }
}

/// Everything the dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub leads: LeadStats,
    pub pipeline: PipelineStats,
    pub monthly_revenue: BTreeMap<String, f64>,
    pub tasks: TaskStats,
    pub campaigns: CampaignStats,
    pub calls: CallStats,
}

pub fn dashboard(
    leads: &[Lead],
    deals: &[Deal],
    tasks: &[Task],
    campaigns: &[Campaign],
    calls: &[Call],
    now: DateTime<Utc>,
) -> DashboardSummary {
    DashboardSummary {
        generated_at: now,
        leads: lead_stats(leads),
        pipeline: pipeline_stats(deals),
        monthly_revenue: monthly_won_revenue(deals),
        tasks: task_stats(tasks, now.date_naive()),
        campaigns: campaign_stats(campaigns),
        calls: call_stats(calls),
    }
}
