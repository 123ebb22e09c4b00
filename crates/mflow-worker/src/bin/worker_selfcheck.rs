use std::path::Path;

use mflow_media::{ensure_available, PresetRegistry, ScriptRunner};
use mflow_queue::{MessageQueue, RedisStreamQueue};
use mflow_storage::{ObjectStore, R2Client};
use mflow_store::{JobRepository, RedisJobRepository};
use mflow_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tools(&config)?;
    ensure_scripts(&config)?;

    let presets = PresetRegistry::from_env()?;
    println!("worker-selfcheck: {} presets", presets.names().len());

    ensure_env_present(&["REDIS_URL", "R2_BUCKET_NAME"])?;
    R2Client::from_env()?.check_connectivity().await?;

    let repo = RedisJobRepository::from_env()?;
    repo.ping().await?;

    let queue = RedisStreamQueue::from_env()?;
    queue.init().await?;
    queue.ping().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let marker = path.join(".selfcheck");
    tokio::fs::write(&marker, b"ok").await?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_tools(config: &WorkerConfig) -> anyhow::Result<()> {
    for tool in [&config.ffmpeg_bin, &config.ffprobe_bin, &config.python_bin] {
        let resolved = ensure_available(tool)
            .map_err(|e| anyhow::anyhow!("{} not available: {}", tool.display(), e))?;
        println!("worker-selfcheck: found {}", resolved.display());
    }
    Ok(())
}

fn ensure_scripts(config: &WorkerConfig) -> anyhow::Result<()> {
    let runner = ScriptRunner::new(config.python_bin.clone(), config.scripts_dir.clone());
    let missing = runner.missing_scripts();
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "missing processing scripts: {}",
            missing
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
