//! Runs the migrations and one full won transition against a real Postgres
//! database. Skipped unless `TEST_DATABASE_URL` points at a disposable one.

use anyhow::{Context, Result};
use entity::deal::Stage;
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, connect};
use products_crm::contacts::{self, NewContact};
use products_crm::deals::{self, NewDeal};
use products_crm::transition::{StageMove, move_to_stage};
use products_crm::{BoardOptions, build_board};
use suite_tests::now;
use uuid::Uuid;

#[tokio::test]
async fn won_transition_round_trips_on_postgres() -> Result<()> {
    if std::env::var("TEST_DATABASE_URL").is_err() {
        eprintln!("TEST_DATABASE_URL not set; skipping postgres smoke test");
        return Ok(());
    }
    let db = connect(&DatabaseSettings::new("TEST_DATABASE_URL").with_max_connections(2))
        .await
        .context("connect to TEST_DATABASE_URL")?;
    Migrator::refresh(&db).await.context("reset schema")?;

    let user_id = Uuid::new_v4();
    let contact = contacts::create_contact(
        &db,
        user_id,
        NewContact {
            name: "Smoke".into(),
            email: None,
        },
        now(),
    )
    .await?;
    let deal = deals::create_deal(
        &db,
        user_id,
        NewDeal {
            title: "Smoke deal".into(),
            amount_cents: 1_000,
            contact_id: Some(contact.id),
            ..NewDeal::default()
        },
        now(),
    )
    .await?;

    let won = move_to_stage(&db, user_id, deal.id, StageMove::to(Stage::Won), now()).await?;
    assert_eq!(won.version, deal.version + 1);
    assert!(won.actual_close_date.is_some());

    let contact = contacts::get_contact(&db, user_id, contact.id).await?;
    assert_eq!(contact.deals_count, 1);
    assert_eq!(contact.lifetime_value_cents, 1_000);

    let board = build_board(&db, user_id, BoardOptions::at(now())).await?;
    assert_eq!(board.column(Stage::Won).map(|c| c.count), Some(1));
    Ok(())
}
