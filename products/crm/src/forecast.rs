//! Revenue forecasting over a user's open deals plus closed-deal statistics.
//! Everything is recomputed on each call.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use entity::deal::{self, Stage};
use sea_orm::{ActiveEnum, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::board::sum_cents;
use crate::deals::user_deals;
use crate::error::CrmResult;
use crate::stages::{StageMeta, open_stages};

pub const DEFAULT_FORECAST_QUARTERS: u32 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForecastPoint {
    /// `2026-10` for months, `2026-Q4` for quarters.
    pub period: String,
    pub label: String,
    pub starts_on: NaiveDate,
    /// Sum of weighted values of open deals expected to close in the period.
    pub amount_cents: i64,
    pub deals: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WinRateStats {
    pub won_count: u64,
    pub lost_count: u64,
    pub won_amount_cents: i64,
    pub lost_amount_cents: i64,
    /// Percent of closed deals that were won; 0 when nothing has closed.
    pub win_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageCount {
    pub stage: &'static StageMeta,
    pub count: usize,
    pub weighted_amount_cents: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleTimeStats {
    pub deals_won: usize,
    pub avg_days: f64,
    pub p50_days: f64,
    pub p90_days: f64,
}

struct Period {
    key: String,
    label: String,
    start: NaiveDate,
    end: NaiveDate,
}

#[instrument(name = "crm.monthly_forecast", skip(db))]
pub async fn monthly_forecast<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    months: u32,
    today: NaiveDate,
) -> CrmResult<Vec<ForecastPoint>> {
    let deals = load_open_deals(db, user_id).await?;
    Ok(monthly_points(&deals, months, today))
}

#[instrument(name = "crm.quarterly_forecast", skip(db))]
pub async fn quarterly_forecast<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    quarters: u32,
    today: NaiveDate,
) -> CrmResult<Vec<ForecastPoint>> {
    let deals = load_open_deals(db, user_id).await?;
    Ok(quarterly_points(&deals, quarters, today))
}

#[instrument(name = "crm.win_rate", skip(db))]
pub async fn win_rate_stats<C: ConnectionTrait>(db: &C, user_id: Uuid) -> CrmResult<WinRateStats> {
    let deals = load_closed_deals(db, user_id).await?;
    Ok(win_rate_of(&deals))
}

#[instrument(name = "crm.stage_distribution", skip(db))]
pub async fn stage_distribution<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> CrmResult<Vec<StageCount>> {
    let deals = load_open_deals(db, user_id).await?;
    Ok(stage_counts(&deals))
}

#[instrument(name = "crm.top_forecast_deals", skip(db))]
pub async fn top_forecast_deals<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    limit: usize,
) -> CrmResult<Vec<deal::Model>> {
    let deals = load_open_deals(db, user_id).await?;
    Ok(rank_top_deals(deals, limit))
}

/// Mean days from creation to close over won deals; `None` without any.
#[instrument(name = "crm.average_cycle_time", skip(db))]
pub async fn average_cycle_time<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> CrmResult<Option<f64>> {
    let won = load_won_deals(db, user_id).await?;
    Ok(mean_cycle_days(&won))
}

#[instrument(name = "crm.cycle_time_stats", skip(db))]
pub async fn cycle_time_stats<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> CrmResult<Option<CycleTimeStats>> {
    let won = load_won_deals(db, user_id).await?;
    Ok(cycle_stats(&won))
}

async fn load_open_deals<C: ConnectionTrait>(db: &C, user_id: Uuid) -> CrmResult<Vec<deal::Model>> {
    let open: Vec<String> = open_stages().map(|meta| meta.stage.to_value()).collect();
    Ok(user_deals(user_id)
        .filter(deal::Column::Stage.is_in(open))
        .all(db)
        .await?)
}

async fn load_closed_deals<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> CrmResult<Vec<deal::Model>> {
    Ok(user_deals(user_id)
        .filter(deal::Column::Stage.is_in([Stage::Won.to_value(), Stage::Lost.to_value()]))
        .all(db)
        .await?)
}

async fn load_won_deals<C: ConnectionTrait>(db: &C, user_id: Uuid) -> CrmResult<Vec<deal::Model>> {
    Ok(user_deals(user_id)
        .filter(deal::Column::Stage.eq(Stage::Won.to_value()))
        .all(db)
        .await?)
}

/// `months` calendar months starting with the one containing `today`.
pub fn monthly_points(deals: &[deal::Model], months: u32, today: NaiveDate) -> Vec<ForecastPoint> {
    let first = month_start(today);
    let periods = (0..months)
        .map(|offset| {
            let start = add_months(first, offset);
            Period {
                key: format!("{:04}-{:02}", start.year(), start.month()),
                label: start.format("%b %Y").to_string(),
                start,
                end: add_months(start, 1),
            }
        })
        .collect();
    bucket_weighted(deals, periods)
}

/// `quarters` calendar quarters starting with the one containing `today`.
pub fn quarterly_points(
    deals: &[deal::Model],
    quarters: u32,
    today: NaiveDate,
) -> Vec<ForecastPoint> {
    let first = quarter_start(today);
    let periods = (0..quarters)
        .map(|offset| {
            let start = add_months(first, offset * 3);
            let quarter = start.month0() / 3 + 1;
            Period {
                key: format!("{:04}-Q{}", start.year(), quarter),
                label: format!("Q{} {}", quarter, start.year()),
                start,
                end: add_months(start, 3),
            }
        })
        .collect();
    bucket_weighted(deals, periods)
}

fn bucket_weighted(deals: &[deal::Model], periods: Vec<Period>) -> Vec<ForecastPoint> {
    periods
        .into_iter()
        .map(|period| {
            let matching: Vec<&deal::Model> = deals
                .iter()
                .filter(|deal| !deal.is_closed())
                .filter(|deal| {
                    deal.expected_close_date
                        .map(|date| date >= period.start && date < period.end)
                        .unwrap_or(false)
                })
                .collect();
            ForecastPoint {
                period: period.key,
                label: period.label,
                starts_on: period.start,
                amount_cents: sum_cents(matching.iter().map(|deal| deal.weighted_value_cents())),
                deals: matching.len(),
            }
        })
        .collect()
}

pub fn win_rate_of(deals: &[deal::Model]) -> WinRateStats {
    let mut stats = WinRateStats {
        won_count: 0,
        lost_count: 0,
        won_amount_cents: 0,
        lost_amount_cents: 0,
        win_rate: 0.0,
    };
    for deal in deals {
        match deal.stage {
            Stage::Won => {
                stats.won_count += 1;
                stats.won_amount_cents = stats.won_amount_cents.saturating_add(deal.amount_cents);
            }
            Stage::Lost => {
                stats.lost_count += 1;
                stats.lost_amount_cents = stats.lost_amount_cents.saturating_add(deal.amount_cents);
            }
            _ => {}
        }
    }
    let closed = stats.won_count + stats.lost_count;
    if closed > 0 {
        stats.win_rate = stats.won_count as f64 / closed as f64 * 100.0;
    }
    stats
}

/// Open stages in catalog order, zero counts included.
pub fn stage_counts(deals: &[deal::Model]) -> Vec<StageCount> {
    let mut counts: HashMap<Stage, (usize, i64)> = HashMap::new();
    for deal in deals.iter().filter(|deal| !deal.is_closed()) {
        let entry = counts.entry(deal.stage).or_default();
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(deal.weighted_value_cents());
    }
    open_stages()
        .map(|meta| {
            let (count, weighted) = counts.get(&meta.stage).copied().unwrap_or_default();
            StageCount {
                stage: meta,
                count,
                weighted_amount_cents: weighted,
            }
        })
        .collect()
}

/// Highest weighted value first; ties go to the earliest expected close,
/// undated deals last.
pub fn rank_top_deals(mut deals: Vec<deal::Model>, limit: usize) -> Vec<deal::Model> {
    deals.retain(|deal| !deal.is_closed());
    deals.sort_by(|a, b| {
        b.weighted_value_cents()
            .cmp(&a.weighted_value_cents())
            .then_with(|| compare_close_dates(a.expected_close_date, b.expected_close_date))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    deals.truncate(limit);
    deals
}

fn compare_close_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn mean_cycle_days(deals: &[deal::Model]) -> Option<f64> {
    let durations = cycle_durations(deals);
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<f64>() / durations.len() as f64)
}

pub fn cycle_stats(deals: &[deal::Model]) -> Option<CycleTimeStats> {
    let mut durations = cycle_durations(deals);
    if durations.is_empty() {
        return None;
    }
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let avg = durations.iter().sum::<f64>() / durations.len() as f64;
    Some(CycleTimeStats {
        deals_won: durations.len(),
        avg_days: avg,
        p50_days: percentile(&durations, 0.5),
        p90_days: percentile(&durations, 0.9),
    })
}

fn cycle_durations(deals: &[deal::Model]) -> Vec<f64> {
    deals
        .iter()
        .filter(|deal| deal.stage == Stage::Won)
        .filter_map(|deal| {
            let closed = deal.actual_close_date?;
            let delta = closed - deal.created_at;
            Some((delta.num_seconds() as f64 / 86_400.0).max(0.0))
        })
        .collect()
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let clamped = percentile.clamp(0.0, 1.0);
    let rank = (clamped * values.len() as f64).ceil().max(1.0) as usize - 1;
    let idx = rank.min(values.len() - 1);
    values[idx]
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = date.month0() / 3 * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

fn add_months(first_of_month: NaiveDate, months: u32) -> NaiveDate {
    let total = first_of_month.month0() + months;
    let year = first_of_month.year() + (total / 12) as i32;
    let month = total % 12 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first_of_month)
}
