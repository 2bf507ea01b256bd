//! Deal pipeline board and drag-and-drop stage reassignment
//!
//! Deals are partitioned into the six stage columns. Hovering a dragged
//! card over a column or over another card resolves a target stage and
//! moves the card locally at once. Dropping persists only the `stage`
//! field with one update request. If that request fails, the board is
//! refetched, which discards the optimistic move. Ordering inside a column
//! is not persisted, and concurrent edits are last-write-wins.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{fetch_all, Backend, Query, SortOrder};
use crate::model::{Deal, DealStage, Table};
use crate::{Error, Result};

/// What the dragged card is hovering over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    /// A stage column (the column id is the stage)
    Column(DealStage),
    /// Another deal card; the target is that card's current stage
    Card(Uuid),
}

/// A resolved reassignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageMove {
    pub deal_id: Uuid,
    pub from: DealStage,
    pub to: DealStage,
}

impl StageMove {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// One board column with its totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageColumn {
    pub stage: DealStage,
    pub label: &'static str,
    pub deals: Vec<Deal>,
    pub count: usize,
    pub total_value: f64,
    pub weighted_value: f64,
}

/// Local copy of the deals shown on the board
#[derive(Debug, Clone, Default)]
pub struct PipelineBoard {
    deals: Vec<Deal>,
    /// Pre-drag stage of each card moved by hovering but not yet dropped
    pending: HashMap<Uuid, DealStage>,
}

impl PipelineBoard {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self {
            deals,
            pending: HashMap::new(),
        }
    }

    /// Fetch every deal, newest first
    pub async fn load(backend: &dyn Backend) -> Result<Self> {
        let query = Query::new().order("created_at", SortOrder::Desc);
        let deals = fetch_all::<Deal>(backend, Table::Deals, &query).await?;
        Ok(Self::new(deals))
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn deal(&self, id: Uuid) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    /// Six columns in stage order; every deal appears in exactly one
    pub fn columns(&self) -> Vec<StageColumn> {
        DealStage::ALL
            .iter()
            .map(|&stage| {
                let deals: Vec<Deal> = self
                    .deals
                    .iter()
                    .filter(|d| d.stage == stage)
                    .cloned()
                    .collect();
                StageColumn {
                    stage,
                    label: stage.label(),
                    count: deals.len(),
                    total_value: deals.iter().map(|d| d.value).sum(),
                    weighted_value: deals.iter().map(Deal::weighted_value).sum(),
                    deals,
                }
            })
            .collect()
    }

    /// Stage a drop on `target` would assign; `None` for an unknown card
    pub fn resolve_target(&self, target: DropTarget) -> Option<DealStage> {
        match target {
            DropTarget::Column(stage) => Some(stage),
            DropTarget::Card(id) => self.deal(id).map(|d| d.stage),
        }
    }

    /// Optimistically move `deal_id` to the target's stage
    ///
    /// `from` is the stage before the first hover of this drag.
    pub fn drag_over(&mut self, deal_id: Uuid, target: DropTarget) -> Option<StageMove> {
        let to = self.resolve_target(target)?;
        let deal = self.deals.iter_mut().find(|d| d.id == deal_id)?;
        let from = *self.pending.entry(deal_id).or_insert(deal.stage);
        deal.stage = to;
        Some(StageMove { deal_id, from, to })
    }

    /// Persist a drop
    ///
    /// The returned move runs from the stage the deal had before the drag
    /// started, even if hovering already moved the card. A drop back onto
    /// that stage sends nothing. On failure the board is reloaded from the
    /// backend and the original error is returned; if the reload also
    /// fails the deal goes back to its pre-drag stage.
    pub async fn commit_drop(
        &mut self,
        backend: &dyn Backend,
        deal_id: Uuid,
        target: DropTarget,
    ) -> Result<StageMove> {
        if self.deal(deal_id).is_none() {
            return Err(Error::NotFound(format!("deal {}", deal_id)));
        }
        let stage_move = self
            .drag_over(deal_id, target)
            .ok_or_else(|| Error::Validation("Drop target is not on the board".to_string()))?;
        let original = stage_move.from;
        self.pending.remove(&deal_id);

        if stage_move.is_noop() {
            return Ok(stage_move);
        }

        let response = backend
            .update(Table::Deals, deal_id, json!({ "stage": stage_move.to }))
            .await;
        match response.into_result() {
            Ok(_) => {
                info!(deal_id = %deal_id, from = %stage_move.from, to = %stage_move.to, "Deal stage updated");
                Ok(stage_move)
            }
            Err(e) => {
                warn!(deal_id = %deal_id, error = %e, "Stage update failed, refetching board");
                match Self::load(backend).await {
                    Ok(fresh) => *self = fresh,
                    Err(reload) => {
                        warn!(error = %reload, "Board refetch failed");
                        if let Some(deal) = self.deals.iter_mut().find(|d| d.id == deal_id) {
                            deal.stage = original;
                        }
                    }
                }
                Err(e)
            }
        }
    }
}
