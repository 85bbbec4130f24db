use anyhow::Result;
use chrono::Duration;
use entity::{contact, deal::Stage};
use products_crm::deals::{self, DealChanges, NewDeal};
use products_crm::transition::{StageMove, move_to_stage, move_to_stage_key};
use products_crm::{CrmError, contacts, stage_meta};
use sea_orm::{ActiveEnum, EntityTrait};
use suite_tests::{TestDb, days_from_today, now};
use uuid::Uuid;

#[tokio::test]
async fn new_deal_gets_lifecycle_defaults() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Website rebuild", 100_000).await?;
    assert_eq!(deal.stage, Stage::Lead);
    assert_eq!(deal.probability, 20);
    assert_eq!(deal.currency, "USD");
    assert_eq!(deal.expected_close_date, Some(days_from_today(30)));
    assert!(deal.actual_close_date.is_none());
    assert_eq!(deal.weighted_value_cents(), 20_000);
    Ok(())
}

#[tokio::test]
async fn negative_value_is_rejected() -> Result<()> {
    let env = TestDb::new().await?;
    let err = env.deal("Refund", -1).await.unwrap_err();
    let crm = err.downcast_ref::<CrmError>().expect("crm error");
    assert!(matches!(crm, CrmError::InvalidInput(_)));
    Ok(())
}

#[tokio::test]
async fn lead_to_proposal_to_won_updates_value_and_contact() -> Result<()> {
    let env = TestDb::new().await?;
    let client = env.contact("Ada").await?;
    let deal = env
        .deal_with(NewDeal {
            title: "Annual support".into(),
            amount_cents: 1_000,
            contact_id: Some(client.id),
            ..NewDeal::default()
        })
        .await?;
    assert_eq!(deal.weighted_value_cents(), 200);

    let proposal =
        move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(Stage::Proposal), now()).await?;
    assert_eq!(proposal.probability, 60);
    assert_eq!(proposal.weighted_value_cents(), 600);
    assert!(proposal.actual_close_date.is_none());

    let won = move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(Stage::Won), now()).await?;
    assert_eq!(won.probability, 100);
    assert_eq!(won.weighted_value_cents(), 1_000);
    assert_eq!(won.actual_close_date, Some(now().into()));

    let contact = contacts::get_contact(&env.db, env.user_id, client.id).await?;
    assert_eq!(contact.lifetime_value_cents, 1_000);
    assert_eq!(contact.deals_count, 1);
    assert_eq!(contact.status, contact::Status::Client);
    Ok(())
}

#[tokio::test]
async fn rewinning_a_won_deal_is_a_no_op() -> Result<()> {
    let env = TestDb::new().await?;
    let client = env.contact("Grace").await?;
    let deal = env
        .deal_with(NewDeal {
            title: "Migration".into(),
            amount_cents: 5_000,
            contact_id: Some(client.id),
            ..NewDeal::default()
        })
        .await?;

    let first = move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(Stage::Won), now()).await?;
    let later = now() + Duration::days(3);
    let second = move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(Stage::Won), later).await?;

    assert_eq!(second, first, "second won transition must not write");
    assert_eq!(second.actual_close_date, Some(now().into()));
    let contact = contacts::get_contact(&env.db, env.user_id, client.id).await?;
    assert_eq!(contact.deals_count, 1);
    assert_eq!(contact.lifetime_value_cents, 5_000);

    let history = deals::stage_history(&env.db, env.user_id, deal.id).await?;
    assert_eq!(history.len(), 1);
    Ok(())
}

#[tokio::test]
async fn won_without_contact_still_closes() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Walk-in", 2_500).await?;
    let won = move_to_stage_key(&env.db, env.user_id, deal.id, "WON", now()).await?;
    assert_eq!(won.stage, Stage::Won);
    assert!(won.actual_close_date.is_some());
    Ok(())
}

#[tokio::test]
async fn lost_records_reason_or_empty_string() -> Result<()> {
    let env = TestDb::new().await?;
    let priced_out = env.deal("Priced out", 9_000).await?;
    let silent = env.deal("Went silent", 9_000).await?;

    let lost = move_to_stage(
        &env.db,
        env.user_id,
        priced_out.id,
        StageMove::to(Stage::Lost).with_loss_reason("  budget cut "),
        now(),
    )
    .await?;
    assert_eq!(lost.loss_reason.as_deref(), Some("budget cut"));
    assert_eq!(lost.probability, 0);
    assert_eq!(lost.weighted_value_cents(), 0);
    assert!(lost.actual_close_date.is_some());

    let no_reason =
        move_to_stage(&env.db, env.user_id, silent.id, StageMove::to(Stage::Lost), now()).await?;
    assert_eq!(no_reason.loss_reason.as_deref(), Some(""));
    Ok(())
}

#[tokio::test]
async fn reopening_clears_close_date_and_loss_reason() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Second chance", 4_000).await?;
    move_to_stage(
        &env.db,
        env.user_id,
        deal.id,
        StageMove::to(Stage::Lost).with_loss_reason("timing"),
        now(),
    )
    .await?;
    let reopened = move_to_stage(
        &env.db,
        env.user_id,
        deal.id,
        StageMove::to(Stage::Negotiation),
        now(),
    )
    .await?;
    assert_eq!(reopened.probability, 80);
    assert!(reopened.actual_close_date.is_none());
    assert!(reopened.loss_reason.is_none());
    Ok(())
}

#[tokio::test]
async fn invariants_hold_across_every_stage() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Tour", 12_345).await?;
    for stage in [
        Stage::Qualified,
        Stage::Won,
        Stage::Proposal,
        Stage::Lost,
        Stage::Lead,
        Stage::Negotiation,
    ] {
        let moved = move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(stage), now()).await?;
        assert_eq!(moved.probability, stage_meta(stage).probability);
        assert_eq!(
            moved.weighted_value_cents(),
            moved.amount_cents * i64::from(moved.probability) / 100
        );
        assert_eq!(moved.is_closed(), moved.actual_close_date.is_some());
        assert_eq!(stage == Stage::Lost, moved.loss_reason.is_some());
    }
    Ok(())
}

#[tokio::test]
async fn unknown_stage_key_leaves_deal_untouched() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Typo", 1_000).await?;
    let err = move_to_stage_key(&env.db, env.user_id, deal.id, "closed-won", now())
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::InvalidStage(ref key) if key == "closed-won"));
    let stored = deals::get_deal(&env.db, env.user_id, deal.id).await?;
    assert_eq!(stored, deal);
    Ok(())
}

#[tokio::test]
async fn other_users_deals_are_not_found() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Private", 1_000).await?;
    let stranger = Uuid::new_v4();
    let err = move_to_stage(&env.db, stranger, deal.id, StageMove::to(Stage::Won), now())
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::DealNotFound(id) if id == deal.id));
    Ok(())
}

#[tokio::test]
async fn deleted_deals_cannot_move() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Abandoned", 1_000).await?;
    deals::soft_delete_deal(&env.db, env.user_id, deal.id, now()).await?;
    let err = move_to_stage(&env.db, env.user_id, deal.id, StageMove::to(Stage::Qualified), now())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let row = entity::deal::Entity::find_by_id(deal.id).one(&env.db).await?;
    assert!(row.is_some_and(|d| d.deleted_at.is_some()), "soft delete keeps the row");
    Ok(())
}

#[tokio::test]
async fn stale_version_is_a_conflict() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Contested", 3_000).await?;
    let stale_version = deal.version;
    deals::update_deal(
        &env.db,
        env.user_id,
        deal.id,
        DealChanges {
            amount_cents: Some(4_000),
            ..DealChanges::default()
        },
        now(),
    )
    .await?;

    let err = move_to_stage(
        &env.db,
        env.user_id,
        deal.id,
        StageMove::to(Stage::Qualified).expecting_version(stale_version),
        now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CrmError::Conflict(id) if id == deal.id));

    let stored = deals::get_deal(&env.db, env.user_id, deal.id).await?;
    assert_eq!(stored.stage, Stage::Lead);
    assert_eq!(stored.version, stale_version + 1);
    Ok(())
}

#[tokio::test]
async fn history_records_each_move_newest_first() -> Result<()> {
    let env = TestDb::new().await?;
    let deal = env.deal("Tracked", 1_000).await?;
    move_to_stage(
        &env.db,
        env.user_id,
        deal.id,
        StageMove::to(Stage::Qualified).with_note("intro call"),
        now(),
    )
    .await?;
    move_to_stage(
        &env.db,
        env.user_id,
        deal.id,
        StageMove::to(Stage::Proposal),
        now() + Duration::hours(1),
    )
    .await?;

    let history = deals::stage_history(&env.db, env.user_id, deal.id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_stage, Stage::Qualified);
    assert_eq!(history[0].to_stage, Stage::Proposal);
    assert_eq!(history[1].from_stage.to_value(), "lead");
    assert_eq!(history[1].note.as_deref(), Some("intro call"));
    Ok(())
}

#[tokio::test]
async fn contact_must_belong_to_the_user() -> Result<()> {
    let env = TestDb::new().await?;
    let other = TestDb {
        db: env.db.clone(),
        user_id: Uuid::new_v4(),
    };
    let foreign = other.contact("Mallory").await?;
    let err = env
        .deal_with(NewDeal {
            title: "Poached".into(),
            amount_cents: 1_000,
            contact_id: Some(foreign.id),
            ..NewDeal::default()
        })
        .await
        .unwrap_err();
    let crm = err.downcast_ref::<CrmError>().expect("crm error");
    assert!(matches!(crm, CrmError::ContactNotFound(_)));
    Ok(())
}
