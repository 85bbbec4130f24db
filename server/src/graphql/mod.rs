mod types;

use async_graphql::{Context, EmptySubscription, Error, ErrorExtensions, ID, Object, Schema};
use chrono::Utc;
use platform_api::ApiError;
use platform_db::DbPool;
use products_crm::contacts::{self, NewContact};
use products_crm::forecast::{self, DEFAULT_FORECAST_QUARTERS};
use products_crm::{BoardOptions, CrmError, StageMove, STAGE_CATALOG, build_board, deals};
use tracing::instrument;
use uuid::Uuid;

use crate::config::PipelineSettings;

pub use types::*;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

const MAX_FORECAST_MONTHS: i32 = 36;
const MAX_FORECAST_QUARTERS: i32 = 12;
const DEFAULT_TOP_DEALS: i32 = 5;
const MAX_TOP_DEALS: i32 = 100;

/// Shared state reachable from every resolver.
#[derive(Clone)]
pub struct GraphqlData {
    pub pool: DbPool,
    pub settings: PipelineSettings,
}

/// The user a request acts for, attached per request by the HTTP layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestUser(pub Uuid);

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    async fn pipeline_stages(&self) -> Vec<PipelineStage> {
        STAGE_CATALOG.iter().map(PipelineStage::from).collect()
    }

    #[instrument(name = "graphql.pipeline_board", skip_all)]
    async fn pipeline_board(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "stuckAfterDays")] stuck_after_days: Option<i32>,
    ) -> async_graphql::Result<PipelineBoardNode> {
        let (data, user) = scope(ctx)?;
        let threshold = match stuck_after_days {
            Some(days) if days < 0 => {
                return Err(invalid_input("stuckAfterDays must be non-negative"));
            }
            Some(days) => days as i64,
            None => data.settings.stuck_after_days,
        };
        let options = BoardOptions::at(Utc::now()).stuck_after(threshold);
        let board = build_board(&data.pool, user, options)
            .await
            .map_err(crm_error)?;
        Ok(board.into())
    }

    #[instrument(name = "graphql.deal", skip_all)]
    async fn deal(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<DealNode>> {
        let (data, user) = scope(ctx)?;
        let deal_id = parse_id(&id)?;
        match deals::get_deal(&data.pool, user, deal_id).await {
            Ok(model) => Ok(Some(model.into())),
            Err(CrmError::DealNotFound(_)) => Ok(None),
            Err(err) => Err(crm_error(err)),
        }
    }

    #[instrument(name = "graphql.deals", skip_all)]
    async fn deals(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<DealNode>> {
        let (data, user) = scope(ctx)?;
        let rows = deals::list_deals(&data.pool, user)
            .await
            .map_err(crm_error)?;
        Ok(rows.into_iter().map(DealNode::from).collect())
    }

    #[instrument(name = "graphql.deal_stage_history", skip_all)]
    async fn deal_stage_history(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "dealId")] deal_id: ID,
    ) -> async_graphql::Result<Vec<DealStageHistoryNode>> {
        let (data, user) = scope(ctx)?;
        let deal_id = parse_id(&deal_id)?;
        let rows = deals::stage_history(&data.pool, user, deal_id)
            .await
            .map_err(crm_error)?;
        Ok(rows.into_iter().map(DealStageHistoryNode::from).collect())
    }

    #[instrument(name = "graphql.monthly_forecast", skip_all)]
    async fn monthly_forecast(
        &self,
        ctx: &Context<'_>,
        months: Option<i32>,
    ) -> async_graphql::Result<Vec<ForecastPointNode>> {
        let (data, user) = scope(ctx)?;
        let months = match months {
            Some(value) => bounded("months", value, MAX_FORECAST_MONTHS)?,
            None => data.settings.forecast_months,
        };
        let points = forecast::monthly_forecast(&data.pool, user, months, Utc::now().date_naive())
            .await
            .map_err(crm_error)?;
        Ok(points.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.quarterly_forecast", skip_all)]
    async fn quarterly_forecast(
        &self,
        ctx: &Context<'_>,
        quarters: Option<i32>,
    ) -> async_graphql::Result<Vec<ForecastPointNode>> {
        let (data, user) = scope(ctx)?;
        let quarters = match quarters {
            Some(value) => bounded("quarters", value, MAX_FORECAST_QUARTERS)?,
            None => DEFAULT_FORECAST_QUARTERS,
        };
        let points =
            forecast::quarterly_forecast(&data.pool, user, quarters, Utc::now().date_naive())
                .await
                .map_err(crm_error)?;
        Ok(points.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.win_rate", skip_all)]
    async fn win_rate(&self, ctx: &Context<'_>) -> async_graphql::Result<WinRateNode> {
        let (data, user) = scope(ctx)?;
        let stats = forecast::win_rate_stats(&data.pool, user)
            .await
            .map_err(crm_error)?;
        Ok(stats.into())
    }

    #[instrument(name = "graphql.stage_distribution", skip_all)]
    async fn stage_distribution(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<StageCountNode>> {
        let (data, user) = scope(ctx)?;
        let counts = forecast::stage_distribution(&data.pool, user)
            .await
            .map_err(crm_error)?;
        Ok(counts.into_iter().map(Into::into).collect())
    }

    #[instrument(name = "graphql.top_forecast_deals", skip_all)]
    async fn top_forecast_deals(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Vec<DealNode>> {
        let (data, user) = scope(ctx)?;
        let limit = bounded("limit", limit.unwrap_or(DEFAULT_TOP_DEALS), MAX_TOP_DEALS)?;
        let rows = forecast::top_forecast_deals(&data.pool, user, limit as usize)
            .await
            .map_err(crm_error)?;
        Ok(rows.into_iter().map(DealNode::from).collect())
    }

    #[instrument(name = "graphql.average_cycle_time", skip_all)]
    async fn average_cycle_time(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<f64>> {
        let (data, user) = scope(ctx)?;
        forecast::average_cycle_time(&data.pool, user)
            .await
            .map_err(crm_error)
    }

    #[instrument(name = "graphql.cycle_time", skip_all)]
    async fn cycle_time(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<CycleTimeNode>> {
        let (data, user) = scope(ctx)?;
        let stats = forecast::cycle_time_stats(&data.pool, user)
            .await
            .map_err(crm_error)?;
        Ok(stats.map(Into::into))
    }
}

#[Object]
impl MutationRoot {
    #[instrument(name = "graphql.create_contact", skip_all)]
    async fn create_contact(
        &self,
        ctx: &Context<'_>,
        input: CreateContactInput,
    ) -> async_graphql::Result<ContactNode> {
        let (data, user) = scope(ctx)?;
        let input = NewContact {
            name: input.name,
            email: input.email,
        };
        let contact = contacts::create_contact(&data.pool, user, input, Utc::now())
            .await
            .map_err(crm_error)?;
        Ok(contact.into())
    }

    #[instrument(name = "graphql.create_deal", skip_all)]
    async fn create_deal(
        &self,
        ctx: &Context<'_>,
        input: CreateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let (data, user) = scope(ctx)?;
        let contact_id = input.contact_id.as_ref().map(parse_id).transpose()?;
        let deal = deals::create_deal(&data.pool, user, input.into_new_deal(contact_id), Utc::now())
            .await
            .map_err(crm_error)?;
        Ok(deal.into())
    }

    #[instrument(name = "graphql.update_deal", skip_all)]
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: UpdateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let (data, user) = scope(ctx)?;
        let deal_id = parse_id(&id)?;
        let deal = deals::update_deal(&data.pool, user, deal_id, input.into(), Utc::now())
            .await
            .map_err(crm_error)?;
        Ok(deal.into())
    }

    #[instrument(name = "graphql.move_deal_stage", skip_all)]
    async fn move_deal_stage(
        &self,
        ctx: &Context<'_>,
        input: MoveDealStageInput,
    ) -> async_graphql::Result<DealNode> {
        let (data, user) = scope(ctx)?;
        let deal_id = parse_id(&input.deal_id)?;
        let mut request = StageMove::from_key(&input.stage).map_err(crm_error)?;
        if let Some(note) = input.note {
            request = request.with_note(note);
        }
        if let Some(reason) = input.loss_reason {
            request = request.with_loss_reason(reason);
        }
        if let Some(version) = input.expected_version {
            request = request.expecting_version(version);
        }
        let deal = products_crm::move_to_stage(&data.pool, user, deal_id, request, Utc::now())
            .await
            .map_err(crm_error)?;
        Ok(deal.into())
    }

    #[instrument(name = "graphql.delete_deal", skip_all)]
    async fn delete_deal(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let (data, user) = scope(ctx)?;
        let deal_id = parse_id(&id)?;
        deals::soft_delete_deal(&data.pool, user, deal_id, Utc::now())
            .await
            .map_err(crm_error)?;
        Ok(true)
    }
}

fn scope<'a>(ctx: &Context<'a>) -> async_graphql::Result<(&'a GraphqlData, Uuid)> {
    let data = ctx
        .data::<GraphqlData>()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("graphql data missing")).extend())?;
    let user = ctx
        .data::<RequestUser>()
        .map_err(|_| ApiError::Unauthorized.extend())?;
    Ok((data, user.0))
}

fn parse_id(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| invalid_input(format!("invalid id `{}`", id.as_str())))
}

fn bounded(name: &str, value: i32, max: i32) -> async_graphql::Result<u32> {
    if !(1..=max).contains(&value) {
        return Err(invalid_input(format!("{name} must be between 1 and {max}")));
    }
    Ok(value as u32)
}

fn invalid_input(message: impl Into<String>) -> Error {
    ApiError::InvalidInput(message.into()).extend()
}

/// Maps core failures onto the GraphQL error codes.
pub fn api_error(err: CrmError) -> ApiError {
    match err {
        CrmError::InvalidStage(key) => ApiError::InvalidStage(key),
        CrmError::DealNotFound(id) => ApiError::NotFound(format!("deal {id}")),
        CrmError::ContactNotFound(id) => ApiError::NotFound(format!("contact {id}")),
        CrmError::InvalidInput(message) => ApiError::InvalidInput(message),
        CrmError::Conflict(id) => {
            ApiError::Conflict(format!("deal {id} was modified concurrently"))
        }
        err @ CrmError::Db(_) => ApiError::internal(err.into()),
    }
}

fn crm_error(err: CrmError) -> Error {
    api_error(err).extend()
}
