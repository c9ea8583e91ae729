use std::path::Path;
use std::process::Command;

use vmix_worker::WorkerConfig;

/// Variables the pipeline cannot run without.
const REQUIRED_ENV: [&str; 3] = ["WAVESPEED_API_KEY", "GEMINI_API_KEY", "AWS_BUCKET_NAME"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "vmix-selfcheck: starting with temp_dir={} output_dir={}",
        config.temp_dir.display(),
        config.output_dir.display()
    );
    ensure_writable(&config.temp_dir).await?;
    ensure_writable(&config.output_dir).await?;
    ensure_ffmpeg()?;
    ensure_env_present(&REQUIRED_ENV)?;

    println!("vmix-selfcheck: ok");
    Ok(())
}

async fn ensure_writable(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let marker = dir.join(".vmix-selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("{} is not writable: {}", dir.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    let missing: Vec<&str> = vars
        .iter()
        .copied()
        .filter(|var| std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect();

    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "missing required env vars: {}",
            missing.join(", ")
        ));
    }
    Ok(())
}
