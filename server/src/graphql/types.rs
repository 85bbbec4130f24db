use async_graphql::{Enum, ID, InputObject, MaybeUndefined, SimpleObject};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{contact, deal, deal_stage_history};
use products_crm::forecast::{CycleTimeStats, ForecastPoint, StageCount, WinRateStats};
use products_crm::{BoardDeal, DealChanges, NewDeal, PipelineBoard, PipelineColumn, StageMeta};

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum DealPriority {
    #[graphql(name = "LOW")]
    Low,
    #[graphql(name = "MEDIUM")]
    Medium,
    #[graphql(name = "HIGH")]
    High,
}

impl From<deal::Priority> for DealPriority {
    fn from(value: deal::Priority) -> Self {
        match value {
            deal::Priority::Low => DealPriority::Low,
            deal::Priority::Medium => DealPriority::Medium,
            deal::Priority::High => DealPriority::High,
        }
    }
}

impl From<DealPriority> for deal::Priority {
    fn from(value: DealPriority) -> Self {
        match value {
            DealPriority::Low => deal::Priority::Low,
            DealPriority::Medium => deal::Priority::Medium,
            DealPriority::High => deal::Priority::High,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PipelineStage {
    pub key: String,
    #[graphql(name = "displayName")]
    pub display_name: String,
    #[graphql(name = "sortOrder")]
    pub sort_order: i32,
    pub probability: i32,
    pub color: String,
    #[graphql(name = "isWon")]
    pub is_won: bool,
    #[graphql(name = "isLost")]
    pub is_lost: bool,
}

impl From<&StageMeta> for PipelineStage {
    fn from(meta: &StageMeta) -> Self {
        Self {
            key: meta.key().to_string(),
            display_name: meta.display_name.to_string(),
            sort_order: meta.sort_order as i32,
            probability: meta.probability as i32,
            color: meta.color.to_string(),
            is_won: meta.is_won,
            is_lost: meta.is_lost,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Deal")]
pub struct DealNode {
    pub id: ID,
    pub title: String,
    pub stage: String,
    #[graphql(name = "amountCents")]
    pub amount_cents: i64,
    pub currency: String,
    pub probability: i32,
    #[graphql(name = "weightedValueCents")]
    pub weighted_value_cents: i64,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: Option<NaiveDate>,
    #[graphql(name = "actualCloseDate")]
    pub actual_close_date: Option<DateTime<Utc>>,
    pub priority: DealPriority,
    #[graphql(name = "lossReason")]
    pub loss_reason: Option<String>,
    pub source: Option<String>,
    #[graphql(name = "contactId")]
    pub contact_id: Option<ID>,
    pub version: i32,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[graphql(name = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<deal::Model> for DealNode {
    fn from(model: deal::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            weighted_value_cents: model.weighted_value_cents(),
            stage: model.stage.key().to_string(),
            title: model.title,
            amount_cents: model.amount_cents,
            currency: model.currency,
            probability: model.probability as i32,
            expected_close_date: model.expected_close_date,
            actual_close_date: model.actual_close_date.map(Into::into),
            priority: model.priority.into(),
            loss_reason: model.loss_reason,
            source: model.source,
            contact_id: model.contact_id.map(|id| ID::from(id.to_string())),
            version: model.version,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Contact")]
pub struct ContactNode {
    pub id: ID,
    pub name: String,
    pub email: Option<String>,
    pub status: String,
    #[graphql(name = "lifetimeValueCents")]
    pub lifetime_value_cents: i64,
    #[graphql(name = "dealsCount")]
    pub deals_count: i32,
    #[graphql(name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<contact::Model> for ContactNode {
    fn from(model: contact::Model) -> Self {
        let status = match model.status {
            contact::Status::Lead => "lead",
            contact::Status::Client => "client",
        };
        Self {
            id: ID::from(model.id.to_string()),
            name: model.name,
            email: model.email,
            status: status.to_string(),
            lifetime_value_cents: model.lifetime_value_cents,
            deals_count: model.deals_count,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "DealStageHistory")]
pub struct DealStageHistoryNode {
    pub id: ID,
    #[graphql(name = "dealId")]
    pub deal_id: ID,
    #[graphql(name = "fromStage")]
    pub from_stage: String,
    #[graphql(name = "toStage")]
    pub to_stage: String,
    pub note: Option<String>,
    #[graphql(name = "changedAt")]
    pub changed_at: DateTime<Utc>,
}

impl From<deal_stage_history::Model> for DealStageHistoryNode {
    fn from(model: deal_stage_history::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            deal_id: ID::from(model.deal_id.to_string()),
            from_stage: model.from_stage.key().to_string(),
            to_stage: model.to_stage.key().to_string(),
            note: model.note,
            changed_at: model.changed_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct BoardDealNode {
    pub deal: DealNode,
    #[graphql(name = "daysInStage")]
    pub days_in_stage: i64,
    #[graphql(name = "isStuck")]
    pub is_stuck: bool,
    #[graphql(name = "isOverdue")]
    pub is_overdue: bool,
}

impl From<BoardDeal> for BoardDealNode {
    fn from(entry: BoardDeal) -> Self {
        Self {
            days_in_stage: entry.days_in_stage,
            is_stuck: entry.is_stuck,
            is_overdue: entry.is_overdue,
            deal: entry.deal.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineColumn")]
pub struct PipelineColumnNode {
    pub stage: PipelineStage,
    pub count: i32,
    #[graphql(name = "totalAmountCents")]
    pub total_amount_cents: i64,
    #[graphql(name = "weightedAmountCents")]
    pub weighted_amount_cents: i64,
    pub deals: Vec<BoardDealNode>,
}

impl From<PipelineColumn> for PipelineColumnNode {
    fn from(column: PipelineColumn) -> Self {
        Self {
            stage: column.stage.into(),
            count: column.count as i32,
            total_amount_cents: column.total_amount_cents,
            weighted_amount_cents: column.weighted_amount_cents,
            deals: column.deals.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "PipelineBoard")]
pub struct PipelineBoardNode {
    pub columns: Vec<PipelineColumnNode>,
    #[graphql(name = "totalCount")]
    pub total_count: i32,
    #[graphql(name = "totalAmountCents")]
    pub total_amount_cents: i64,
    #[graphql(name = "totalWeightedCents")]
    pub total_weighted_cents: i64,
}

impl From<PipelineBoard> for PipelineBoardNode {
    fn from(board: PipelineBoard) -> Self {
        Self {
            total_count: board.total_count as i32,
            total_amount_cents: board.total_amount_cents,
            total_weighted_cents: board.total_weighted_cents,
            columns: board.columns.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "ForecastPoint")]
pub struct ForecastPointNode {
    pub period: String,
    pub label: String,
    #[graphql(name = "startsOn")]
    pub starts_on: NaiveDate,
    #[graphql(name = "amountCents")]
    pub amount_cents: i64,
    pub deals: i32,
}

impl From<ForecastPoint> for ForecastPointNode {
    fn from(point: ForecastPoint) -> Self {
        Self {
            period: point.period,
            label: point.label,
            starts_on: point.starts_on,
            amount_cents: point.amount_cents,
            deals: point.deals as i32,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "WinRate")]
pub struct WinRateNode {
    #[graphql(name = "wonCount")]
    pub won_count: i64,
    #[graphql(name = "lostCount")]
    pub lost_count: i64,
    #[graphql(name = "wonAmountCents")]
    pub won_amount_cents: i64,
    #[graphql(name = "lostAmountCents")]
    pub lost_amount_cents: i64,
    #[graphql(name = "winRate")]
    pub win_rate: f64,
}

impl From<WinRateStats> for WinRateNode {
    fn from(stats: WinRateStats) -> Self {
        Self {
            won_count: stats.won_count as i64,
            lost_count: stats.lost_count as i64,
            won_amount_cents: stats.won_amount_cents,
            lost_amount_cents: stats.lost_amount_cents,
            win_rate: stats.win_rate,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "StageCount")]
pub struct StageCountNode {
    pub stage: PipelineStage,
    pub count: i32,
    #[graphql(name = "weightedAmountCents")]
    pub weighted_amount_cents: i64,
}

impl From<StageCount> for StageCountNode {
    fn from(count: StageCount) -> Self {
        Self {
            stage: count.stage.into(),
            count: count.count as i32,
            weighted_amount_cents: count.weighted_amount_cents,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "CycleTime")]
pub struct CycleTimeNode {
    #[graphql(name = "dealsWon")]
    pub deals_won: i32,
    #[graphql(name = "avgDays")]
    pub avg_days: f64,
    #[graphql(name = "p50Days")]
    pub p50_days: f64,
    #[graphql(name = "p90Days")]
    pub p90_days: f64,
}

impl From<CycleTimeStats> for CycleTimeNode {
    fn from(stats: CycleTimeStats) -> Self {
        Self {
            deals_won: stats.deals_won as i32,
            avg_days: stats.avg_days,
            p50_days: stats.p50_days,
            p90_days: stats.p90_days,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateContactInput {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateDealInput {
    pub title: String,
    #[graphql(name = "amountCents")]
    pub amount_cents: i64,
    pub currency: Option<String>,
    #[graphql(name = "contactId")]
    pub contact_id: Option<ID>,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: Option<NaiveDate>,
    pub priority: Option<DealPriority>,
    pub source: Option<String>,
}

impl CreateDealInput {
    pub fn into_new_deal(self, contact_id: Option<uuid::Uuid>) -> NewDeal {
        NewDeal {
            title: self.title,
            amount_cents: self.amount_cents,
            currency: self.currency,
            contact_id,
            expected_close_date: self.expected_close_date,
            priority: self.priority.map(Into::into),
            source: self.source,
        }
    }
}

/// Omitted fields are left alone; an explicit `null` clears the nullable ones.
#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateDealInput {
    pub title: Option<String>,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    #[graphql(name = "expectedCloseDate")]
    pub expected_close_date: MaybeUndefined<NaiveDate>,
    pub priority: Option<DealPriority>,
    pub source: MaybeUndefined<String>,
}

impl From<UpdateDealInput> for DealChanges {
    fn from(input: UpdateDealInput) -> Self {
        Self {
            title: input.title,
            amount_cents: input.amount_cents,
            currency: input.currency,
            expected_close_date: patch(input.expected_close_date),
            priority: input.priority.map(Into::into),
            source: patch(input.source),
        }
    }
}

fn patch<T>(value: MaybeUndefined<T>) -> Option<Option<T>> {
    match value {
        MaybeUndefined::Undefined => None,
        MaybeUndefined::Null => Some(None),
        MaybeUndefined::Value(value) => Some(Some(value)),
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct MoveDealStageInput {
    #[graphql(name = "dealId")]
    pub deal_id: ID,
    /// Stage key, e.g. `proposal`.
    pub stage: String,
    pub note: Option<String>,
    #[graphql(name = "lossReason")]
    pub loss_reason: Option<String>,
    #[graphql(name = "expectedVersion")]
    pub expected_version: Option<i32>,
}
