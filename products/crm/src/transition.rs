//! The only sanctioned mutator of a deal's stage, probability and close date.

use chrono::{DateTime, Utc};
use entity::deal::{self, Stage};
use entity::deal_stage_history;
use sea_orm::{ActiveValue::Set, ConnectionTrait, EntityTrait, TransactionTrait};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::contacts;
use crate::deals::{self, blank_changes, write_versioned};
use crate::error::{CrmError, CrmResult};
use crate::stages::{parse_stage, stage_meta};

#[derive(Clone, Debug)]
pub struct StageMove {
    pub stage: Stage,
    pub note: Option<String>,
    /// Stored only when moving to lost; a missing reason is stored as empty.
    pub loss_reason: Option<String>,
    /// Reject the move if the deal's version differs.
    pub expected_version: Option<i32>,
}

impl StageMove {
    pub fn to(stage: Stage) -> Self {
        Self {
            stage,
            note: None,
            loss_reason: None,
            expected_version: None,
        }
    }

    pub fn from_key(key: &str) -> CrmResult<Self> {
        Ok(Self::to(parse_stage(key)?))
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_loss_reason(mut self, reason: impl Into<String>) -> Self {
        self.loss_reason = Some(reason.into());
        self
    }

    pub fn expecting_version(mut self, version: i32) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Moves a deal to `request.stage` inside one transaction.
///
/// Re-applying the current stage is a no-op: nothing is written, no history
/// row is added and the won side effect does not fire again. A real move into
/// `won` bumps the linked contact's deal count and lifetime value and marks it
/// a client, all committed together with the deal update.
#[instrument(
    name = "crm.move_to_stage",
    skip(db, request, now),
    fields(to = request.stage.key())
)]
pub async fn move_to_stage<C>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
    request: StageMove,
    now: DateTime<Utc>,
) -> CrmResult<deal::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let current = deals::get_deal(&txn, user_id, deal_id).await?;
    if let Some(expected) = request.expected_version {
        if expected != current.version {
            return Err(CrmError::Conflict(deal_id));
        }
    }
    if current.stage == request.stage {
        txn.commit().await?;
        debug!(stage = current.stage.key(), "stage unchanged; nothing to do");
        return Ok(current);
    }

    let from = current.stage;
    let target = stage_meta(request.stage);
    let mut active = blank_changes();
    active.stage = Set(target.stage);
    active.probability = Set(target.probability);
    active.actual_close_date = Set(target.is_closed().then(|| now.into()));
    active.loss_reason = Set(target.is_lost.then(|| {
        request
            .loss_reason
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }));
    active.updated_at = Set(now.into());
    let updated = write_versioned(&txn, &current, active).await?;

    let history = deal_stage_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        deal_id: Set(deal_id),
        from_stage: Set(from),
        to_stage: Set(target.stage),
        note: Set(request.note.clone()),
        changed_at: Set(now.into()),
    };
    deal_stage_history::Entity::insert(history)
        .exec_without_returning(&txn)
        .await?;

    if target.is_won {
        if let Some(contact_id) = updated.contact_id {
            contacts::increment_deals_count(&txn, contact_id, now).await?;
            contacts::increment_lifetime_value(&txn, contact_id, updated.amount_cents, now)
                .await?;
            contacts::convert_to_client(&txn, contact_id, now).await?;
        }
    }

    txn.commit().await?;
    info!(
        from = from.key(),
        to = target.key(),
        probability = target.probability,
        "deal stage changed"
    );
    Ok(updated)
}

/// Same as [`move_to_stage`] for a raw stage key; unknown keys fail before
/// any storage access.
pub async fn move_to_stage_key<C>(
    db: &C,
    user_id: Uuid,
    deal_id: Uuid,
    key: &str,
    now: DateTime<Utc>,
) -> CrmResult<deal::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let request = StageMove::from_key(key)?;
    move_to_stage(db, user_id, deal_id, request, now).await
}
