//! Assetline CLI - warm the asset cache from the command line.
//!
//! Loads a list of locators against a bundle directory (and the network for
//! `r:` locators), logs progress, and prints a JSON report of the cache.

mod items;

use anyhow::{bail, Context, Result};
use assetline_core::resource::RawResourceFactory;
use assetline_core::{
    AssetPipeline, CacheEntryInfo, CacheStats, LoadProgress, PipelineConfig, ResourceKind,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "assetline")]
#[command(about = "Warm the Assetline cache and report what got loaded")]
struct Args {
    /// Items to load, as `[kind=]locator` (e.g. `sprite-atlas=r:https://cdn/ui.plist`)
    #[arg(required = true)]
    items: Vec<String>,

    /// Directory whose sub-directories are bundles
    #[arg(short, long)]
    bundle_root: Option<PathBuf>,

    /// JSON pipeline configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bundle used by `l:name` locators
    #[arg(long)]
    default_bundle: Option<String>,

    /// Kind of items given without a `kind=` prefix
    #[arg(short, long, default_value = "binary")]
    kind: String,

    /// Maximum loads in flight (0 = unbounded)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Load one item at a time, in order
    #[arg(long)]
    sequential: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Serialize)]
struct Report {
    loaded: usize,
    failed: usize,
    aborted: bool,
    stats: CacheStats,
    entries: Vec<CacheEntryInfo>,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &args.bundle_root {
        config.bundle_root = Some(root.clone());
    }
    if let Some(bundle) = &args.default_bundle {
        config.default_bundle = bundle.clone();
    }
    if config.bundle_root.is_none() {
        bail!("no bundle root: pass --bundle-root or set bundle_root in the config file");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let default_kind: ResourceKind = args.kind.parse()?;
    let items = args
        .items
        .iter()
        .map(|arg| items::parse_item(arg, default_kind))
        .collect::<Result<Vec<_>>>()?;

    let config = load_config(&args)?;
    let pipeline = AssetPipeline::builder(Arc::new(RawResourceFactory::new()))
        .with_config(config)
        .build()?;

    let total = items.len();
    info!("Loading {} item(s)", total);

    let on_progress = |p: &LoadProgress| {
        if p.success {
            info!("[{}/{}] {}", p.finished, p.total, p.locator);
        } else {
            warn!("[{}/{}] {} failed", p.finished, p.total, p.locator);
        }
    };
    let (tx, rx) = oneshot::channel();
    let on_complete = move |results: assetline_core::LoadResults| {
        let _ = tx.send(results.iter().filter(|r| r.is_some()).count());
    };

    let handle = if args.sequential {
        pipeline.load_sequence(items, on_progress, on_complete)
    } else {
        pipeline.load_parallel(items, on_progress, on_complete, args.concurrency)
    };

    let signal = handle.abort_signal();
    let completed = tokio::select! {
        completed = handle.wait() => completed,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, aborting outstanding loads");
            signal.abort();
            false
        }
    };

    let loaded = if completed { rx.await.unwrap_or(0) } else { 0 };
    let report = Report {
        loaded,
        failed: if completed { total - loaded } else { 0 },
        aborted: !completed,
        stats: pipeline.cache().stats(),
        entries: pipeline.cache().entries(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.aborted {
        bail!("load aborted");
    }
    if report.failed > 0 {
        bail!("{} of {} item(s) failed", report.failed, total);
    }
    Ok(())
}
