use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fedigraph_common::{load_config, ApiConfig, FileConfig, ListingKind};
use fedigraph_harvest::{edges, Harvester, RunOptions};
use mastodon_client::MastodonClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fedigraph", about = "Resumable harvester for fediverse social-graph listings")]
struct Cli {
    /// Path to config TOML file. Built-in defaults apply when omitted.
    #[arg(long, env = "FEDIGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk every pending unit of a listing kind, then merge its checkpoints
    Harvest {
        kind: ListingKind,
        #[arg(long)]
        concurrency: Option<usize>,
        /// Attempt at most this many pending units in this run
        #[arg(long)]
        batch_size: Option<usize>,
        /// Leave checkpoints unmerged
        #[arg(long)]
        no_merge: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show which units the next harvest would attempt
    Pending { kind: ListingKind },
    /// Merge existing checkpoints into one table
    Merge {
        kind: ListingKind,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Count reblogs per (author, reblogger) pair in a merged rebloggers table
    Edges {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fedigraph=info,mastodon_client=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn harvester(config: FileConfig) -> Result<Harvester> {
    let api_config = ApiConfig::from_env()?;
    let client = MastodonClient::new(api_config.access_token, api_config.timeout)
        .context("Failed to build HTTP client")?;
    Ok(Harvester::new(config, Arc::new(client)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "Loading config");
            load_config(path)?
        }
        None => FileConfig::default(),
    };

    match cli.command {
        Command::Harvest {
            kind,
            concurrency,
            batch_size,
            no_merge,
            output,
        } => {
            if let Some(n) = concurrency {
                config.harvest.concurrency = n;
            }
            if batch_size.is_some() {
                config.harvest.batch_size = batch_size;
            }
            let options = RunOptions {
                merge: !no_merge,
                output,
            };
            let report = harvester(config)?.run(kind, &options).await?;
            if report.still_pending() > 0 {
                tracing::info!(
                    remaining = report.still_pending(),
                    "Units remain pending; rerun to resume"
                );
            }
        }
        Command::Pending { kind } => {
            let plan = harvester(config)?.plan(kind)?;
            println!(
                "{kind}: {} considered, {} done, {} pending this run, {} deferred",
                plan.considered,
                plan.completed,
                plan.pending.len(),
                plan.deferred
            );
            for unit in &plan.pending {
                println!("{}\t{}\t{}", unit.target_id, unit.parent_id, unit.host);
            }
        }
        Command::Merge { kind, output } => {
            match harvester(config)?.merge(kind, output.as_deref())? {
                Some(outcome) => println!(
                    "Merged {} artifacts ({} records) into {}",
                    outcome.artifacts,
                    outcome.records,
                    outcome.path.display()
                ),
                None => println!("Nothing to merge"),
            }
        }
        Command::Edges { input, output } => {
            let summary = edges::aggregate_edges(&input, &output)?;
            println!(
                "{} edges from {} rows written to {}",
                summary.edges,
                summary.rows,
                output.display()
            );
        }
    }

    Ok(())
}
