//! Video analysis worker binary.
//!
//! Usage: `vscope-worker <video>...`
//!
//! Each video is analyzed concurrently (bounded by `VSCOPE_MAX_CONCURRENT_RUNS`)
//! and its result printed as one JSON document per line on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscope_models::OwnerId;
use vscope_worker::{AnalyzeRequest, Analyzer, AnalyzerBackends, WorkerConfig};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vscope=info".parse().expect("valid directive"))
        .add_directive("vscope_worker=info".parse().expect("valid directive"));

    // Logs go to stderr; stdout carries results.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

async fn analyze_file(analyzer: &Analyzer, path: PathBuf, owner: OwnerId) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = analyzer
        .analyze(AnalyzeRequest::new(bytes, filename, owner))
        .await
        .with_context(|| format!("analyzing {}", path.display()))?;

    Ok(serde_json::to_string(&result)?)
}

async fn run(paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        vscope_worker::metrics::init_metrics(port).context("installing Prometheus exporter")?;
        info!(port, "Prometheus exporter listening");
    }

    match vscope_media::check_ffmpeg() {
        Ok(path) => info!("Using ffmpeg at {}", path.display()),
        Err(e) => warn!("{}; every run will be missing frames and audio", e),
    }

    let backends = AnalyzerBackends::from_env(&config)
        .await
        .context("configuring backends")?;
    let max_runs = config.max_concurrent_runs;
    let analyzer = Arc::new(Analyzer::new(config, backends));

    if let Err(e) = analyzer.initialize().await {
        warn!("Label embeddings not ready, classification will retry on first run: {}", e);
    }

    let owner = OwnerId::new(std::env::var("VSCOPE_OWNER").unwrap_or_else(|_| "local".to_string()));
    let semaphore = Arc::new(Semaphore::new(max_runs));

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            let semaphore = Arc::clone(&semaphore);
            let owner = owner.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                analyze_file(&analyzer, path, owner).await
            })
        })
        .collect();

    let mut failures = 0usize;
    for handle in handles {
        match handle.await {
            Ok(Ok(json)) => println!("{}", json),
            Ok(Err(e)) => {
                error!("{:#}", e);
                failures += 1;
            }
            Err(e) => {
                error!("Analysis task failed: {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of the requested analyses failed", failures);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: vscope-worker <video>...");
        std::process::exit(2);
    }

    info!("Starting vscope-worker");
    if let Err(e) = run(paths).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
