use std::path::PathBuf;

use anyhow::Context;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

mod aggregate;
mod cache;
mod classify;
mod config;
mod db;
mod error;
mod models;
mod pages;
mod present;
mod report;
mod source;
mod telemetry;

use config::DashboardConfig;
use pages::{Dashboard, Page, PageKind};
use source::{DataSource, SnapshotSource};

#[derive(Parser)]
#[command(name = "pool-dashboard")]
#[command(about = "Interview pool reporting dashboard: batches, branches and pool performance", long_about = None)]
struct Cli {
    /// Read tables from a JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Calendar year whose interviews define the active pools (defaults to the current year)
    #[arg(long, global = true)]
    year: Option<i32>,
    #[arg(long, global = true, value_enum, default_value_t = Format::Markdown)]
    format: Format,
    /// Write the report to a file instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Student distribution by enrollment batch
    Home,
    /// Active pools, branch distribution and pool performance
    Interviews,
    /// Sub-category performance across pools
    Overall,
    /// Branch-wise analysis of a single pool
    TestAnalysis {
        /// Pool name; the first active pool is used when omitted
        #[arg(long)]
        pool: Option<String>,
    },
    /// Render every page
    All {
        /// Pool name for the test analysis page
        #[arg(long)]
        pool: Option<String>,
    },
}

async fn render<S: DataSource>(
    source: S,
    config: &DashboardConfig,
    year: i32,
    command: Commands,
) -> anyhow::Result<Vec<Page>> {
    let mut dashboard = Dashboard::new(source, year, config.cache_ttl);
    let pages = match command {
        Commands::Home => vec![dashboard.render(&PageKind::Home).await?],
        Commands::Interviews => vec![dashboard.render(&PageKind::Interviews).await?],
        Commands::Overall => vec![dashboard.render(&PageKind::Overall).await?],
        Commands::TestAnalysis { pool } => {
            vec![dashboard.render(&PageKind::TestAnalysis { pool }).await?]
        }
        Commands::All { pool } => dashboard.render_all(pool.as_deref()).await?,
    };
    Ok(pages)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.log_level).context("failed to initialise logging")?;

    let year = cli.year.unwrap_or_else(|| Utc::now().year());
    info!(year, org_id = config.org_id, "building dashboard");

    let pages = match &cli.snapshot {
        Some(path) => {
            let source = SnapshotSource::from_path(path, config.org_id, config.email_domain.clone())?;
            render(source, &config, year, cli.command).await?
        }
        None => {
            let database_url = config.require_database_url()?;
            let source =
                db::PgSource::connect(database_url, config.org_id, config.email_domain.clone())
                    .await?;
            render(source, &config, year, cli.command).await?
        }
    };

    let output = match cli.format {
        Format::Markdown => report::render_markdown(&pages),
        Format::Json => report::render_json(&pages)?,
        Format::Csv => report::render_csv(&pages)?,
    };

    match &cli.out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{output}"),
    }

    Ok(())
}
