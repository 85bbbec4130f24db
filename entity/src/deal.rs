use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "deal")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    #[sea_orm(indexed)]
    pub contact_id: Option<Uuid>,
    pub title: String,
    pub stage: Stage,
    pub amount_cents: i64,
    pub currency: String,
    pub probability: i16,
    pub expected_close_date: Option<Date>,
    pub actual_close_date: Option<DateTimeWithTimeZone>,
    pub priority: Priority,
    pub loss_reason: Option<String>,
    pub source: Option<String>,
    pub version: i32,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contact::Entity",
        from = "Column::ContactId",
        to = "super::contact::Column::Id",
        on_delete = "SetNull"
    )]
    Contact,
    #[sea_orm(has_many = "super::deal_stage_history::Entity")]
    StageHistory,
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contact.def()
    }
}

impl Related<super::deal_stage_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageHistory.def()
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[sea_orm(string_value = "lead")]
    Lead,
    #[sea_orm(string_value = "qualified")]
    Qualified,
    #[sea_orm(string_value = "proposal")]
    Proposal,
    #[sea_orm(string_value = "negotiation")]
    Negotiation,
    #[sea_orm(string_value = "won")]
    Won,
    #[sea_orm(string_value = "lost")]
    Lost,
}

impl Stage {
    /// Borrowed form of the stored string value.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Qualified => "qualified",
            Stage::Proposal => "proposal",
            Stage::Negotiation => "negotiation",
            Stage::Won => "won",
            Stage::Lost => "lost",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Stage::Won | Stage::Lost)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
}

impl Model {
    pub fn is_closed(&self) -> bool {
        self.stage.is_closed()
    }

    /// Amount scaled by the closing probability, truncated to whole cents.
    /// Saturates instead of overflowing.
    pub fn weighted_value_cents(&self) -> i64 {
        let weighted = i128::from(self.amount_cents) * i128::from(self.probability) / 100;
        i64::try_from(weighted).unwrap_or(if weighted < 0 { i64::MIN } else { i64::MAX })
    }

    /// Whole days since the last write to this deal, never negative.
    pub fn days_in_stage(&self, now: DateTime<Utc>) -> i64 {
        let updated: DateTime<Utc> = self.updated_at.into();
        (now - updated).num_days().max(0)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_closed()
            && self
                .expected_close_date
                .map(|date| date < today)
                .unwrap_or(false)
    }
}

impl ActiveModelBehavior for ActiveModel {}
