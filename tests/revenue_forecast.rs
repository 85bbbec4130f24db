use anyhow::Result;
use entity::deal::Stage;
use products_crm::deals::NewDeal;
use products_crm::forecast::{
    average_cycle_time, cycle_time_stats, monthly_forecast, quarterly_forecast,
    stage_distribution, top_forecast_deals, win_rate_stats,
};
use products_crm::transition::{StageMove, move_to_stage};
use suite_tests::{TestDb, days_from_today, now, today};
use uuid::Uuid;

async fn dated_deal(env: &TestDb, title: &str, amount_cents: i64, days: i64) -> Result<Uuid> {
    let deal = env
        .deal_with(NewDeal {
            title: title.into(),
            amount_cents,
            expected_close_date: Some(days_from_today(days)),
            ..NewDeal::default()
        })
        .await?;
    Ok(deal.id)
}

#[tokio::test]
async fn monthly_forecast_returns_every_requested_month() -> Result<()> {
    let env = TestDb::new().await?;
    // today is 2026-10-17; +20 days lands in November
    let id = dated_deal(&env, "November close", 100_000, 20).await?;
    move_to_stage(&env.db, env.user_id, id, StageMove::to(Stage::Proposal), now()).await?;

    let points = monthly_forecast(&env.db, env.user_id, 3, today()).await?;
    assert_eq!(points.len(), 3);
    let periods: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["2026-10", "2026-11", "2026-12"]);
    assert_eq!(points[0].amount_cents, 0);
    assert_eq!(points[1].amount_cents, 60_000);
    assert_eq!(points[2].amount_cents, 0);
    Ok(())
}

#[tokio::test]
async fn forecasts_ignore_closed_deals() -> Result<()> {
    let env = TestDb::new().await?;
    let id = dated_deal(&env, "Already won", 100_000, 3).await?;
    move_to_stage(&env.db, env.user_id, id, StageMove::to(Stage::Won), now()).await?;
    dated_deal(&env, "Still open", 10_000, 3).await?;

    let months = monthly_forecast(&env.db, env.user_id, 1, today()).await?;
    assert_eq!(months[0].amount_cents, 2_000);
    assert_eq!(months[0].deals, 1);

    let quarters = quarterly_forecast(&env.db, env.user_id, 4, today()).await?;
    assert_eq!(quarters.len(), 4);
    assert_eq!(quarters[0].label, "Q4 2026");
    assert_eq!(quarters[0].amount_cents, 2_000);
    Ok(())
}

#[tokio::test]
async fn empty_history_yields_zero_win_rate_and_no_cycle_time() -> Result<()> {
    let env = TestDb::new().await?;
    env.deal("Open only", 5_000).await?;
    let stats = win_rate_stats(&env.db, env.user_id).await?;
    assert_eq!(stats.win_rate, 0.0);
    assert_eq!(average_cycle_time(&env.db, env.user_id).await?, None);
    assert!(cycle_time_stats(&env.db, env.user_id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn win_rate_and_cycle_time_from_closed_deals() -> Result<()> {
    let env = TestDb::new().await?;
    let first = env
        .aged_deal(
            NewDeal {
                title: "A".into(),
                amount_cents: 1_000,
                ..NewDeal::default()
            },
            10,
        )
        .await?;
    let second = env
        .aged_deal(
            NewDeal {
                title: "B".into(),
                amount_cents: 3_000,
                ..NewDeal::default()
            },
            30,
        )
        .await?;
    let third = env.deal("C", 7_000).await?;
    move_to_stage(&env.db, env.user_id, first.id, StageMove::to(Stage::Won), now()).await?;
    move_to_stage(&env.db, env.user_id, second.id, StageMove::to(Stage::Won), now()).await?;
    move_to_stage(&env.db, env.user_id, third.id, StageMove::to(Stage::Lost), now()).await?;

    let stats = win_rate_stats(&env.db, env.user_id).await?;
    assert_eq!(stats.won_count, 2);
    assert_eq!(stats.lost_count, 1);
    assert!((stats.win_rate - 66.666).abs() < 0.01);
    assert_eq!(stats.won_amount_cents, 4_000);

    let avg = average_cycle_time(&env.db, env.user_id).await?.expect("won deals exist");
    assert!((avg - 20.0).abs() < 1e-9);
    let cycle = cycle_time_stats(&env.db, env.user_id).await?.unwrap();
    assert_eq!(cycle.deals_won, 2);
    assert_eq!(cycle.p90_days, 30.0);
    Ok(())
}

#[tokio::test]
async fn distribution_and_top_deals_cover_open_pipeline() -> Result<()> {
    let env = TestDb::new().await?;
    let big = dated_deal(&env, "Big", 500_000, 50).await?;
    let tie_late = dated_deal(&env, "Tie late", 100_000, 40).await?;
    let tie_early = dated_deal(&env, "Tie early", 100_000, 10).await?;
    let gone = dated_deal(&env, "Gone", 900_000, 5).await?;
    move_to_stage(&env.db, env.user_id, big, StageMove::to(Stage::Negotiation), now())
        .await?;
    move_to_stage(&env.db, env.user_id, gone, StageMove::to(Stage::Lost), now()).await?;

    let distribution = stage_distribution(&env.db, env.user_id).await?;
    let counts: Vec<(&str, usize)> = distribution
        .iter()
        .map(|c| (c.stage.key(), c.count))
        .collect();
    assert_eq!(
        counts,
        vec![("lead", 2), ("qualified", 0), ("proposal", 0), ("negotiation", 1)]
    );

    let top = top_forecast_deals(&env.db, env.user_id, 2).await?;
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].id, big);
    assert_eq!(top[1].id, tie_early);
    assert_ne!(top[1].id, tie_late);
    Ok(())
}
