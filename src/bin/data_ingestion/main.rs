//! Data ingestion orchestrator - integrates raw exports into ordered stores

use anyhow::{Context, Result};
use std::env;
use tech_stack_backend::ingestion::{
    Category, Engine, EngineConfig, IngestStats, RawSource, ReconciliationReport,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting data ingestion pipeline");

    // Load configuration from environment
    let config = EngineConfig::from_env()?;
    info!("Configuration loaded");

    let engine = Engine::new(config);

    // Explicit `techStack/table=category` targets, or everything still missing
    let args: Vec<String> = env::args().skip(1).collect();
    let targets = if args.is_empty() {
        missing_targets(&engine).await?
    } else {
        args.iter()
            .map(|arg| parse_target(arg))
            .collect::<Result<Vec<_>>>()?
    };

    if targets.is_empty() {
        info!("Nothing to integrate");
        return Ok(());
    }

    let mut failed = 0;
    for (source, category) in &targets {
        match run_source(&engine, source, *category).await {
            Ok(stats) => info!("✓ {} completed: {}", source, stats),
            Err(e) => {
                failed += 1;
                error!("✗ {} failed: {}", source, e);
            }
        }
    }

    // Report any drift left behind
    match engine.reconcile().await? {
        ReconciliationReport::FullyIntegrated => info!("All raw sources are integrated"),
        ReconciliationReport::Missing(missing) => {
            warn!("{} raw sources remain unintegrated", missing.len());
            for source in missing {
                warn!("  missing: {}", source);
            }
        }
    }

    info!(
        "Data ingestion pipeline complete ({} of {} succeeded)",
        targets.len() - failed,
        targets.len()
    );

    if failed > 0 {
        anyhow::bail!("{} sources failed to integrate", failed);
    }
    Ok(())
}

/// Run the pipeline for one raw source
async fn run_source(engine: &Engine, source: &RawSource, category: Category) -> Result<IngestStats> {
    info!("=== {} ({}) ===", source, category);
    let stats = engine
        .ingest(source, category)
        .await
        .with_context(|| format!("integration of {} failed", source))?;
    Ok(stats)
}

/// Everything the reconciler reports missing, paired with its configured category
async fn missing_targets(engine: &Engine) -> Result<Vec<(RawSource, Category)>> {
    info!("Step 1/2: Reconciling raw and ordered areas...");
    let report = engine.reconcile().await.context("reconciliation failed")?;

    info!("Step 2/2: Resolving categories...");
    let mut targets = Vec::new();
    for source in report.missing() {
        match engine.config().category_for(&source.tech_stack) {
            Some(category) => targets.push((source.clone(), category)),
            None => warn!(
                "No category configured for tech stack '{}', skipping {}",
                source.tech_stack, source
            ),
        }
    }

    Ok(targets)
}

/// Parse `techStack/table=category`
fn parse_target(arg: &str) -> Result<(RawSource, Category)> {
    let (path, category) = arg
        .split_once('=')
        .with_context(|| format!("expected techStack/table=category, got '{}'", arg))?;
    let (tech_stack, table) = path
        .split_once('/')
        .with_context(|| format!("expected techStack/table=category, got '{}'", arg))?;
    let category = category.parse::<Category>()?;

    Ok((RawSource::new(tech_stack, table), category))
}
