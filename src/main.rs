use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csr_approver::config::{self, Config};
use csr_approver::decider::Decider;
use csr_approver::inspectors::Inspectors;
use csr_approver::metrics::DecisionMetrics;
use csr_approver::registry::Plugins;
use csr_approver::runner;
use csr_approver::store::memory::MemoryStore;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` must be loaded before clap reads env-backed arguments.
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();
    init_tracing(args.log_format);

    let cfg = config::load()?;
    let plugins = Plugins::with_builtins();

    let result = match args.command {
        cli::Commands::Plugins => {
            println!("approvers:  {}", plugins.approvers.list().join(", "));
            println!("inspectors: {}", plugins.inspectors.list().join(", "));
            Ok(())
        }
        cli::Commands::Check { inspectors } => {
            let spec = inspectors.unwrap_or_else(|| cfg.inspectors.clone());
            check_policy(&plugins, &spec)
        }
        cli::Commands::Run {
            requests,
            approver,
            inspectors,
            max_attempts,
            metrics,
        } => {
            let cfg = Config {
                approver: approver.unwrap_or(cfg.approver),
                inspectors: inspectors.unwrap_or(cfg.inspectors),
                max_attempts: max_attempts.unwrap_or(cfg.max_attempts),
                ..cfg
            };
            run(&plugins, &cfg, &requests, metrics).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(format: cli::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "csr_approver=info".into()),
    );

    // Logs go to stderr; stdout carries command output.
    match format {
        cli::LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        cli::LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn check_policy(plugins: &Plugins, spec: &str) -> anyhow::Result<()> {
    let pipeline = Inspectors::parse(&plugins.inspectors, spec)?;
    if pipeline.is_empty() {
        println!("(empty policy: no inspectors)");
    } else {
        println!("{}", pipeline);
    }
    Ok(())
}

async fn run(
    plugins: &Plugins,
    cfg: &Config,
    requests: &std::path::Path,
    print_metrics: bool,
) -> anyhow::Result<()> {
    let metrics = Arc::new(DecisionMetrics::new().context("failed to register metrics")?);
    let decider = Decider::from_policy(plugins, &cfg.approver, &cfg.inspectors, cfg.retry_policy())?
        .with_metrics(metrics.clone());

    tracing::info!(
        approver = decider.approver_name().unwrap_or("none"),
        inspectors = %decider.inspectors(),
        "policy loaded"
    );

    let store = MemoryStore::from_requests(runner::load_requests(requests)?);
    tracing::info!(count = store.len(), "requests loaded");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            shutdown.cancel();
        }
    });

    let outcomes = runner::run_batch(&decider, &store, &cancel).await?;
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    if print_metrics {
        print!("{}", metrics.render()?);
    }
    Ok(())
}
