mod config;
mod graphql;
mod http;
mod seed;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline-server", version, about = "Deal pipeline and revenue forecast service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve {
        #[arg(long, help = "Allow starting even when migrations are pending")]
        allow_dirty: bool,
    },
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Seed demo contacts and deals for one user.
    Seed {
        #[arg(long, env = "SEED_USER_ID", value_name = "UUID")]
        user: Uuid,
    },
    /// Print the GraphQL schema in SDL form.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
    /// Drop every migration and apply them again.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { allow_dirty } => run_server(AppConfig::load()?, allow_dirty).await,
        Command::Migrate(action) => migrate(action).await,
        Command::Seed { user } => run_seed(user).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings)
        .await
        .context("failed to connect to the database")
}

async fn run_server(config: AppConfig, allow_dirty: bool) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, allow_dirty).await?;
    let schema = graphql::build_schema(GraphqlData {
        pool: pool.clone(),
        settings: config.pipeline,
    });
    let state = AppState {
        pool,
        schema,
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    };
    http::serve(config.bind, state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `pipeline-server migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate(action: MigrateCommand) -> Result<()> {
    let pool = setup_pool().await?;
    match action {
        MigrateCommand::Up => {
            Migrator::up(&pool, None).await?;
            info!("database migrations applied");
        }
        MigrateCommand::Down => {
            Migrator::down(&pool, Some(1)).await?;
            info!("most recent migration rolled back");
        }
        MigrateCommand::Reset => {
            Migrator::refresh(&pool).await?;
            info!("database schema rebuilt");
        }
    }
    Ok(())
}

async fn run_seed(user: Uuid) -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    let summary = seed::seed_demo(&pool, user, Utc::now())
        .await
        .context("seeding demo data")?;
    info!(contacts = summary.contacts, deals = summary.deals, "seed complete");
    Ok(())
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let sdl = graphql::SchemaType::build(
        graphql::QueryRoot,
        graphql::MutationRoot,
        async_graphql::EmptySubscription,
    )
    .finish()
    .sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("writing schema to {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}
