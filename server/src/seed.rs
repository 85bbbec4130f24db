//! Demo data for a fresh database: two contacts and a handful of deals spread
//! across the pipeline, created through the regular pipeline operations.

use chrono::{DateTime, Duration, Utc};
use entity::deal::{Priority, Stage};
use platform_db::DbPool;
use products_crm::contacts::{self, NewContact};
use products_crm::deals::{self, NewDeal};
use products_crm::{CrmResult, StageMove, move_to_stage};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub contacts: usize,
    pub deals: usize,
}

struct DemoDeal {
    title: &'static str,
    amount_cents: i64,
    close_in_days: i64,
    priority: Priority,
    stage: Stage,
    client: Option<usize>,
}

const DEMO_CONTACTS: [(&str, &str); 2] = [
    ("Ada Lovelace", "ada@acme.test"),
    ("Charles Babbage", "charles@nuflights.test"),
];

const DEMO_DEALS: [DemoDeal; 6] = [
    DemoDeal {
        title: "ACME website rebuild",
        amount_cents: 1_250_000,
        close_in_days: 20,
        priority: Priority::High,
        stage: Stage::Proposal,
        client: Some(0),
    },
    DemoDeal {
        title: "ACME support retainer",
        amount_cents: 480_000,
        close_in_days: 45,
        priority: Priority::Medium,
        stage: Stage::Qualified,
        client: Some(0),
    },
    DemoDeal {
        title: "NuFlights booking engine",
        amount_cents: 3_400_000,
        close_in_days: 75,
        priority: Priority::High,
        stage: Stage::Negotiation,
        client: Some(1),
    },
    DemoDeal {
        title: "NuFlights audit",
        amount_cents: 600_000,
        close_in_days: -10,
        priority: Priority::Low,
        stage: Stage::Won,
        client: Some(1),
    },
    DemoDeal {
        title: "Cold inbound lead",
        amount_cents: 150_000,
        close_in_days: 30,
        priority: Priority::Low,
        stage: Stage::Lead,
        client: None,
    },
    DemoDeal {
        title: "Lost hosting migration",
        amount_cents: 900_000,
        close_in_days: -5,
        priority: Priority::Medium,
        stage: Stage::Lost,
        client: None,
    },
];

pub async fn seed_demo(db: &DbPool, user_id: Uuid, now: DateTime<Utc>) -> CrmResult<SeedSummary> {
    let mut contact_ids = Vec::with_capacity(DEMO_CONTACTS.len());
    for (name, email) in DEMO_CONTACTS {
        let contact = contacts::create_contact(
            db,
            user_id,
            NewContact {
                name: name.to_string(),
                email: Some(email.to_string()),
            },
            now,
        )
        .await?;
        contact_ids.push(contact.id);
    }

    for demo in &DEMO_DEALS {
        let deal = deals::create_deal(
            db,
            user_id,
            NewDeal {
                title: demo.title.to_string(),
                amount_cents: demo.amount_cents,
                contact_id: demo.client.and_then(|idx| contact_ids.get(idx).copied()),
                expected_close_date: Some(now.date_naive() + Duration::days(demo.close_in_days)),
                priority: Some(demo.priority),
                source: Some("seed".to_string()),
                ..NewDeal::default()
            },
            now,
        )
        .await?;
        if demo.stage != Stage::Lead {
            let mut request = StageMove::to(demo.stage).with_note("seeded");
            if demo.stage == Stage::Lost {
                request = request.with_loss_reason("chose a cheaper vendor");
            }
            move_to_stage(db, user_id, deal.id, request, now).await?;
        }
    }

    let summary = SeedSummary {
        contacts: contact_ids.len(),
        deals: DEMO_DEALS.len(),
    };
    info!(%user_id, contacts = summary.contacts, deals = summary.deals, "demo data seeded");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use platform_db::{DatabaseSettings, connect};
    use products_crm::{BoardOptions, build_board};

    #[tokio::test]
    async fn seeds_a_populated_pipeline() {
        let settings = DatabaseSettings::default()
            .with_url("sqlite::memory:")
            .with_max_connections(1);
        let db = connect(&settings).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();

        let summary = seed_demo(&db, user, now).await.unwrap();
        assert_eq!(summary, SeedSummary { contacts: 2, deals: 6 });

        let board = build_board(&db, user, BoardOptions::at(now)).await.unwrap();
        assert_eq!(board.total_count, 6);
        assert!(board.columns.iter().all(|column| column.count == 1));
        let won = &board.column(Stage::Won).unwrap().deals[0].deal;
        let client = contacts::get_contact(&db, user, won.contact_id.unwrap())
            .await
            .unwrap();
        assert_eq!(client.deals_count, 1);
        assert_eq!(client.lifetime_value_cents, 600_000);
    }
}
