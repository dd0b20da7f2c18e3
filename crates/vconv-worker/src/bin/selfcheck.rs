use std::path::Path;
use std::process::Command;

use vconv_media::check_ffmpeg;
use vconv_storage::S3Client;
use vconv_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "vconv-selfcheck: starting with scratch_dir={}",
        config.scratch_dir.display()
    );
    ensure_scratch_dir(&config.scratch_dir).await?;

    let ffmpeg = match &config.ffmpeg_path {
        Some(path) => path.clone(),
        None => check_ffmpeg()?,
    };
    ensure_ffmpeg(&ffmpeg)?;

    if let Ok(bucket) = std::env::var("VCONV_SELFCHECK_BUCKET") {
        let client = S3Client::from_env().await?;
        client.check_connectivity(&bucket).await?;
        println!("vconv-selfcheck: bucket {} reachable", bucket);
    }

    println!("vconv-selfcheck: ok");
    Ok(())
}

async fn ensure_scratch_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;

    let marker = path.join(".vconv-selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("scratch dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_ffmpeg(binary: &Path) -> anyhow::Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available at {}: {}", binary.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}
