//! Read-only pipeline board: every catalog stage as a column with its deals
//! and totals.

use chrono::{DateTime, Utc};
use entity::deal::{self, Stage};
use sea_orm::ConnectionTrait;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::deals::list_deals;
use crate::error::CrmResult;
use crate::stages::{STAGE_CATALOG, StageMeta};

pub const DEFAULT_STUCK_AFTER_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug)]
pub struct BoardOptions {
    /// Open deals idle for more than this many days are flagged stuck.
    pub stuck_after_days: i64,
    pub now: DateTime<Utc>,
}

impl BoardOptions {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            stuck_after_days: DEFAULT_STUCK_AFTER_DAYS,
            now,
        }
    }

    pub fn stuck_after(mut self, days: i64) -> Self {
        self.stuck_after_days = days.max(0);
        self
    }
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

#[derive(Clone, Debug)]
pub struct BoardDeal {
    pub deal: deal::Model,
    pub weighted_value_cents: i64,
    pub days_in_stage: i64,
    pub is_stuck: bool,
    pub is_overdue: bool,
}

impl BoardDeal {
    fn new(deal: deal::Model, options: &BoardOptions) -> Self {
        let days_in_stage = deal.days_in_stage(options.now);
        let is_stuck = !deal.is_closed() && days_in_stage > options.stuck_after_days;
        let is_overdue = deal.is_overdue(options.now.date_naive());
        Self {
            weighted_value_cents: deal.weighted_value_cents(),
            days_in_stage,
            is_stuck,
            is_overdue,
            deal,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineColumn {
    pub stage: &'static StageMeta,
    pub count: usize,
    pub total_amount_cents: i64,
    pub weighted_amount_cents: i64,
    pub deals: Vec<BoardDeal>,
}

impl PipelineColumn {
    fn empty(stage: &'static StageMeta) -> Self {
        Self {
            stage,
            count: 0,
            total_amount_cents: 0,
            weighted_amount_cents: 0,
            deals: Vec::new(),
        }
    }

    fn push(&mut self, deal: BoardDeal) {
        self.count += 1;
        self.total_amount_cents = self.total_amount_cents.saturating_add(deal.deal.amount_cents);
        self.weighted_amount_cents = self
            .weighted_amount_cents
            .saturating_add(deal.weighted_value_cents);
        self.deals.push(deal);
    }
}

#[derive(Clone, Debug)]
pub struct PipelineBoard {
    pub columns: Vec<PipelineColumn>,
    pub total_count: usize,
    pub total_amount_cents: i64,
    pub total_weighted_cents: i64,
}

impl PipelineBoard {
    pub fn column(&self, stage: Stage) -> Option<&PipelineColumn> {
        self.columns.iter().find(|column| column.stage.stage == stage)
    }

    pub fn stuck_deals(&self) -> impl Iterator<Item = &BoardDeal> {
        self.columns
            .iter()
            .flat_map(|column| column.deals.iter())
            .filter(|deal| deal.is_stuck)
    }
}

#[instrument(name = "crm.build_board", skip(db, options))]
pub async fn build_board<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    options: BoardOptions,
) -> CrmResult<PipelineBoard> {
    let deals = list_deals(db, user_id).await?;
    let board = aggregate_board(deals, &options);
    debug!(
        total = board.total_count,
        stuck = board.stuck_deals().count(),
        "pipeline board built"
    );
    Ok(board)
}

/// Groups `deals` (already in display order) into the catalog columns.
pub fn aggregate_board(deals: Vec<deal::Model>, options: &BoardOptions) -> PipelineBoard {
    let mut columns: Vec<PipelineColumn> =
        STAGE_CATALOG.iter().map(PipelineColumn::empty).collect();
    for deal in deals {
        if let Some(column) = columns
            .iter_mut()
            .find(|column| column.stage.stage == deal.stage)
        {
            column.push(BoardDeal::new(deal, options));
        }
    }
    let total_count = columns.iter().map(|col| col.count).sum();
    let total_amount_cents = sum_cents(columns.iter().map(|col| col.total_amount_cents));
    let total_weighted_cents = sum_cents(columns.iter().map(|col| col.weighted_amount_cents));
    PipelineBoard {
        columns,
        total_count,
        total_amount_cents,
        total_weighted_cents,
    }
}

/// Money totals clamp at the `i64` bounds rather than wrapping.
pub(crate) fn sum_cents(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0i64, i64::saturating_add)
}
