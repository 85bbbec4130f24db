//! Contact collaborator: the pipeline only creates contacts and bumps their
//! running totals when a linked deal is won.

use chrono::{DateTime, Utc};
use entity::contact;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CrmError, CrmResult};

const MAX_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 255;

#[derive(Clone, Debug, Default)]
pub struct NewContact {
    pub name: String,
    pub email: Option<String>,
}

pub async fn create_contact<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    input: NewContact,
    now: DateTime<Utc>,
) -> CrmResult<contact::Model> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CrmError::invalid("contact name cannot be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CrmError::invalid(format!(
            "contact name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    let email = input
        .email
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    if let Some(address) = email.as_deref() {
        if !address.contains('@') {
            return Err(CrmError::invalid("email must contain @"));
        }
        if address.chars().count() > MAX_EMAIL_LEN {
            return Err(CrmError::invalid(format!(
                "email cannot exceed {MAX_EMAIL_LEN} characters"
            )));
        }
    }
    let model = contact::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        name: Set(name),
        email: Set(email),
        status: Set(contact::Status::Lead),
        lifetime_value_cents: Set(0),
        deals_count: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    Ok(model.insert(db).await?)
}

pub async fn get_contact<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    contact_id: Uuid,
) -> CrmResult<contact::Model> {
    contact::Entity::find_by_id(contact_id)
        .filter(contact::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(CrmError::ContactNotFound(contact_id))
}

pub async fn increment_deals_count<C: ConnectionTrait>(
    db: &C,
    contact_id: Uuid,
    now: DateTime<Utc>,
) -> CrmResult<()> {
    let result = contact::Entity::update_many()
        .col_expr(
            contact::Column::DealsCount,
            Expr::col(contact::Column::DealsCount).add(1),
        )
        .col_expr(contact::Column::UpdatedAt, Expr::value(stamp(now)))
        .filter(contact::Column::Id.eq(contact_id))
        .exec(db)
        .await?;
    ensure_touched(result.rows_affected, contact_id)
}

pub async fn increment_lifetime_value<C: ConnectionTrait>(
    db: &C,
    contact_id: Uuid,
    amount_cents: i64,
    now: DateTime<Utc>,
) -> CrmResult<()> {
    let result = contact::Entity::update_many()
        .col_expr(
            contact::Column::LifetimeValueCents,
            Expr::col(contact::Column::LifetimeValueCents).add(amount_cents),
        )
        .col_expr(contact::Column::UpdatedAt, Expr::value(stamp(now)))
        .filter(contact::Column::Id.eq(contact_id))
        .exec(db)
        .await?;
    ensure_touched(result.rows_affected, contact_id)
}

pub async fn convert_to_client<C: ConnectionTrait>(
    db: &C,
    contact_id: Uuid,
    now: DateTime<Utc>,
) -> CrmResult<()> {
    let result = contact::Entity::update_many()
        .col_expr(
            contact::Column::Status,
            Expr::value(contact::Status::Client.to_value()),
        )
        .col_expr(contact::Column::UpdatedAt, Expr::value(stamp(now)))
        .filter(contact::Column::Id.eq(contact_id))
        .exec(db)
        .await?;
    debug!(%contact_id, "contact converted to client");
    ensure_touched(result.rows_affected, contact_id)
}

fn stamp(now: DateTime<Utc>) -> sea_orm::prelude::DateTimeWithTimeZone {
    now.into()
}

fn ensure_touched(rows: u64, contact_id: Uuid) -> CrmResult<()> {
    if rows == 0 {
        Err(CrmError::ContactNotFound(contact_id))
    } else {
        Ok(())
    }
}
