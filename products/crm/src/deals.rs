//! Deal records: creation with lifecycle defaults, scoped reads, detail edits
//! and soft deletion. Stage changes go through [`crate::transition`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use entity::{deal, deal_stage_history};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Select,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::contacts;
use crate::error::{CrmError, CrmResult};
use crate::stages::stage_meta;

const MAX_TITLE_LEN: usize = 255;
const MAX_SOURCE_LEN: usize = 64;
/// Largest accepted deal value; keeps `amount * probability` inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = i64::MAX / 100;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_CLOSE_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Debug, Default)]
pub struct NewDeal {
    pub title: String,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub contact_id: Option<Uuid>,
    pub expected_close_date: Option<NaiveDate>,
    pub priority: Option<deal::Priority>,
    pub source: Option<String>,
}

/// Detail edits. `None` leaves a field alone; the nested options clear it.
#[derive(Clone, Debug, Default)]
pub struct DealChanges {
    pub title: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub expected_close_date: Option<Option<NaiveDate>>,
    pub priority: Option<deal::Priority>,
    pub source: Option<Option<String>>,
}

impl DealChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount_cents.is_none()
            && self.currency.is_none()
            && self.expected_close_date.is_none()
            && self.priority.is_none()
            && self.source.is_none()
    }
}

/// Live (not soft-deleted) deals owned by `user_id`.
pub fn user_deals(user_id: Uuid) -> Select<deal::Entity> {
    deal::Entity::find()
        .filter(deal::Column::UserId.eq(user_id))
        .filter(deal::Column::DeletedAt.is_null())
}

pub async fn create_deal<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    input: NewDeal,
    now: DateTime<Utc>,
) -> CrmResult<deal::Model> {
    let title = validate_title(&input.title)?;
    validate_amount(input.amount_cents)?;
    let source = validate_source(input.source)?;
    let currency = match input.currency {
        Some(raw) => validate_currency(&raw)?,
        None => DEFAULT_CURRENCY.to_string(),
    };
    if let Some(contact_id) = input.contact_id {
        contacts::get_contact(db, user_id, contact_id).await?;
    }
    let expected_close = input
        .expected_close_date
        .unwrap_or_else(|| now.date_naive() + Duration::days(DEFAULT_CLOSE_WINDOW_DAYS));
    let lead = stage_meta(deal::Stage::Lead);
    let model = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        contact_id: Set(input.contact_id),
        title: Set(title),
        stage: Set(lead.stage),
        amount_cents: Set(input.amount_cents),
        currency: Set(currency),
        probability: Set(lead.probability),
        expected_close_date: Set(Some(expected_close)),
        actual_close_date: Set(None),
        priority: Set(input.priority.unwrap_or(deal::Priority::Medium)),
        loss_reason: Set(None),
        source: Set(source),
        version: Set(0),
        deleted_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let created = model.insert(db).await?;
    info!(deal_id = %created.id, %user_id, "deal created");
    Ok(created)
}

pub async fn get_deal<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
) -> CrmResult<deal::Model> {
    user_deals(user_id)
        .filter(deal::Column::Id.eq(deal_id))
        .one(db)
        .await?
        .ok_or(CrmError::DealNotFound(deal_id))
}

/// Ordered by expected close date, undated deals last.
pub async fn list_deals<C: ConnectionTrait>(db: &C, user_id: Uuid) -> CrmResult<Vec<deal::Model>> {
    let mut deals = user_deals(user_id)
        .order_by_asc(deal::Column::ExpectedCloseDate)
        .order_by_asc(deal::Column::CreatedAt)
        .all(db)
        .await?;
    sort_by_expected_close(&mut deals);
    Ok(deals)
}

#[instrument(name = "crm.update_deal", skip(db, changes, now))]
pub async fn update_deal<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
    changes: DealChanges,
    now: DateTime<Utc>,
) -> CrmResult<deal::Model> {
    let current = get_deal(db, user_id, deal_id).await?;
    if changes.is_empty() {
        return Ok(current);
    }
    let mut active = blank_changes();
    if let Some(title) = changes.title {
        active.title = Set(validate_title(&title)?);
    }
    if let Some(amount) = changes.amount_cents {
        validate_amount(amount)?;
        active.amount_cents = Set(amount);
    }
    if let Some(currency) = changes.currency {
        active.currency = Set(validate_currency(&currency)?);
    }
    if let Some(expected) = changes.expected_close_date {
        active.expected_close_date = Set(expected);
    }
    if let Some(priority) = changes.priority {
        active.priority = Set(priority);
    }
    if let Some(source) = changes.source {
        active.source = Set(validate_source(source)?);
    }
    active.updated_at = Set(now.into());
    write_versioned(db, &current, active).await
}

pub async fn soft_delete_deal<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
    now: DateTime<Utc>,
) -> CrmResult<deal::Model> {
    let current = get_deal(db, user_id, deal_id).await?;
    let mut active = blank_changes();
    active.deleted_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let deleted = write_versioned(db, &current, active).await?;
    info!(%deal_id, %user_id, "deal soft-deleted");
    Ok(deleted)
}

/// Stage history of one deal, newest first.
pub async fn stage_history<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
) -> CrmResult<Vec<deal_stage_history::Model>> {
    get_deal(db, user_id, deal_id).await?;
    let rows = deal_stage_history::Entity::find()
        .filter(deal_stage_history::Column::DealId.eq(deal_id))
        .order_by_desc(deal_stage_history::Column::ChangedAt)
        .all(db)
        .await?;
    Ok(rows)
}

/// Applies `changes` only if the row still carries `current.version`.
pub(crate) async fn write_versioned<C: ConnectionTrait>(
    db: &C,
    current: &deal::Model,
    mut changes: deal::ActiveModel,
) -> CrmResult<deal::Model> {
    changes.version = Set(current.version + 1);
    let result = deal::Entity::update_many()
        .set(changes)
        .filter(deal::Column::Id.eq(current.id))
        .filter(deal::Column::Version.eq(current.version))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(CrmError::Conflict(current.id));
    }
    deal::Entity::find_by_id(current.id)
        .one(db)
        .await?
        .ok_or(CrmError::DealNotFound(current.id))
}

pub(crate) fn blank_changes() -> deal::ActiveModel {
    <deal::ActiveModel as ActiveModelTrait>::default()
}

pub(crate) fn sort_by_expected_close(deals: &mut [deal::Model]) {
    deals.sort_by_key(|deal| {
        (
            deal.expected_close_date.is_none(),
            deal.expected_close_date,
            deal.created_at,
        )
    });
}

fn validate_title(raw: &str) -> CrmResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(CrmError::invalid("deal title cannot be blank"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CrmError::invalid(format!(
            "deal title cannot exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_amount(amount_cents: i64) -> CrmResult<()> {
    if amount_cents < 0 {
        return Err(CrmError::invalid("deal value cannot be negative"));
    }
    if amount_cents > MAX_AMOUNT_CENTS {
        return Err(CrmError::invalid(format!(
            "deal value cannot exceed {MAX_AMOUNT_CENTS} cents"
        )));
    }
    Ok(())
}

fn validate_source(raw: Option<String>) -> CrmResult<Option<String>> {
    let source = clean_optional(raw);
    if let Some(value) = source.as_deref() {
        if value.chars().count() > MAX_SOURCE_LEN {
            return Err(CrmError::invalid(format!(
                "deal source cannot exceed {MAX_SOURCE_LEN} characters"
            )));
        }
    }
    Ok(source)
}

fn validate_currency(raw: &str) -> CrmResult<String> {
    let code = raw.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CrmError::invalid(format!(
            "currency must be a 3-letter ISO code, got `{}`",
            raw.trim()
        )));
    }
    Ok(code)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
