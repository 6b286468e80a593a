use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use schoolpulse_lib::ranking::BlockMetric;
use schoolpulse_lib::services::block_map::{load_block_metrics, BlockMetricView};
use schoolpulse_lib::services::predictions::{PredictionKind, RequestOutcome};
use schoolpulse_lib::state::{default_config_path, load_config, AppState};
use schoolpulse_lib::types::Scope;

#[derive(Parser)]
#[command(name = "schoolpulse", version, about = "District school dashboard data")]
struct Cli {
    /// Config file (defaults to ~/.schoolpulse/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every source of a dashboard and print the snapshot.
    Refresh {
        dashboard: String,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        block: Option<String>,
        #[arg(long)]
        udise: Option<String>,
    },
    /// Trigger a server-side import, wait for it to settle, then refresh.
    Import { dashboard: String },
    /// Generate (or reuse) one of the analytics predictions.
    Predict {
        kind: PredictionKind,
        /// Regenerate even when a result is cached.
        #[arg(long)]
        refresh: bool,
    },
    /// Rank blocks by one metric.
    Blocks {
        #[arg(long, default_value = "shi")]
        metric: BlockMetric,
    },
    /// Show configured dashboards and insight generation status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    schoolpulse_lib::init_logging();
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let state = AppState::new(load_config(&config_path)?)?;

    match cli.command {
        Command::Refresh {
            dashboard,
            district,
            block,
            udise,
        } => {
            let orchestrator = state.dashboard(&dashboard)?;
            let scope = Scope {
                district_code: district,
                block_code: block,
                udise_code: udise,
            };
            let snapshot = match orchestrator.set_scope(scope).await {
                Some(result) => result?,
                None => orchestrator.refresh().await?,
            };
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
        Command::Import { dashboard } => {
            let job = state.import(&dashboard)?.start_import().await?;
            println!(
                "Import started for {}, refreshing in {}s",
                job.dashboard,
                job.settle_delay.as_secs()
            );
            job.finished().await;
            println!("{}", serde_json::to_string_pretty(&state.dashboard(&dashboard)?.status())?);
        }
        Command::Predict { kind, refresh } => {
            let outcome = if refresh {
                state.predictions.refresh(kind).await?
            } else {
                state.predictions.request(kind).await?
            };
            if let RequestOutcome::Cached(_) = outcome {
                log::info!("{} served from cache", kind);
            }
            let Some(result) = outcome.result() else {
                anyhow::bail!("{} analysis is already being generated", kind);
            };
            let out = json!({
                "result": &*result,
                "sections": result.sections(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Blocks { metric } => {
            let resp = load_block_metrics(state.api.as_ref(), &state.config.analytics_base_path).await?;
            let mut view = BlockMetricView::new(resp.blocks);
            view.select(metric);
            println!("{:>4}  {:<28} {:>10}  tier", "rank", "block", metric.label());
            for row in view.ranked() {
                println!(
                    "{:>4}  {:<28} {:>10.2}  {:?} ({})",
                    row.rank, row.block_name, row.value, row.tier, row.color
                );
            }
        }
        Command::Status => {
            for id in state.dashboard_ids() {
                let dashboard = state.dashboard(id)?;
                println!(
                    "{:<10} {:<20} {} sources",
                    id,
                    dashboard.config().base_path,
                    dashboard.config().sources.len()
                );
            }
            match state.predictions.insights_status().await {
                Ok(status) => println!(
                    "insights: provider={} enabled={} model={}",
                    status.provider, status.enabled, status.model
                ),
                Err(e) => println!("insights: unavailable ({})", e),
            }
        }
    }

    Ok(())
}
