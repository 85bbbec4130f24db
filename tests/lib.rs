//! Shared fixtures for the integration suites: a migrated in-memory SQLite
//! database and shortcuts for seeding contacts and deals.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use entity::{contact, deal};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use products_crm::contacts::{self, NewContact};
use products_crm::deals::{self, NewDeal};
use uuid::Uuid;

pub struct TestDb {
    pub db: DbPool,
    pub user_id: Uuid,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let settings = DatabaseSettings::default()
            .with_url("sqlite::memory:")
            .with_max_connections(1);
        let db = connect(&settings).await?;
        Migrator::up(&db, None).await?;
        Ok(Self {
            db,
            user_id: Uuid::new_v4(),
        })
    }

    pub async fn contact(&self, name: &str) -> Result<contact::Model> {
        let input = NewContact {
            name: name.to_string(),
            email: Some(format!("{}@example.test", name.to_lowercase())),
        };
        Ok(contacts::create_contact(&self.db, self.user_id, input, now()).await?)
    }

    pub async fn deal(&self, title: &str, amount_cents: i64) -> Result<deal::Model> {
        self.deal_with(NewDeal {
            title: title.to_string(),
            amount_cents,
            ..NewDeal::default()
        })
        .await
    }

    pub async fn deal_with(&self, input: NewDeal) -> Result<deal::Model> {
        Ok(deals::create_deal(&self.db, self.user_id, input, now()).await?)
    }

    /// A deal whose creation (and last update) happened `days` before [`now`].
    pub async fn aged_deal(&self, input: NewDeal, days: i64) -> Result<deal::Model> {
        let created = now() - Duration::days(days);
        Ok(deals::create_deal(&self.db, self.user_id, input, created).await?)
    }
}

/// Fixed clock for every suite.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}
