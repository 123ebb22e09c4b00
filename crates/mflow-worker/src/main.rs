//! Media job worker binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mflow_media::PresetRegistry;
use mflow_queue::{MessageQueue, RedisStreamQueue};
use mflow_storage::{CdnConfig, ObjectStage, ObjectStore, R2Client, StageConfig};
use mflow_store::{JobRepository, RedisJobRepository};
use mflow_worker::{
    CompletionNotifier, JobExecutor, LogNotifier, ProcessingContext, WebhookNotifier, WorkerConfig,
    WorkerResult,
};

#[tokio::main]
async fn main() {
    // Required before any TLS client is built.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting mflow-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => info!("Prometheus exporter listening on port {}", port),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    }

    let queue = match RedisStreamQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.init().await {
        error!("Failed to initialize job queue: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = queue.ping().await {
        error!("Job queue is unreachable: {}", e);
        std::process::exit(1);
    }
    if config.heartbeat_interval >= queue.config().visibility_timeout {
        warn!(
            "Heartbeat interval {:?} is not below the queue visibility timeout {:?}; long jobs may be redelivered",
            config.heartbeat_interval,
            queue.config().visibility_timeout
        );
    }

    let ctx = match build_context(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to create processing context: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(Arc::new(ctx), Arc::new(queue)));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["mflow=info", "mflow_worker=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
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
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn build_context(config: WorkerConfig) -> WorkerResult<ProcessingContext> {
    let store = R2Client::from_env()?;
    store.check_connectivity().await?;
    let stage = ObjectStage::new(Arc::new(store), StageConfig::from_env(), CdnConfig::from_env());

    let repo = RedisJobRepository::from_env()?;
    repo.ping().await?;
    let presets = PresetRegistry::from_env()?;
    info!("Loaded {} filter presets", presets.names().len());

    let notifier: Arc<dyn CompletionNotifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Completion notifications go to {}", url);
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => Arc::new(LogNotifier),
    };

    let missing = mflow_media::ScriptRunner::new(config.python_bin.clone(), config.scripts_dir.clone())
        .missing_scripts();
    for script in &missing {
        warn!("Processing script {} not found", script.display());
    }

    Ok(ProcessingContext::new(config, stage, Arc::new(repo), presets, notifier))
}
