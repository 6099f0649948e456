//! Model file cache layout and download.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// (path inside the model repository, local file name)
const REMOTE_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", MODEL_FILE),
    ("tokenizer.json", TOKENIZER_FILE),
];

/// Directory holding one model's files: `<cache_dir>/<org>--<name>`.
pub fn model_dir(cache_dir: &Path, model: &str) -> PathBuf {
    cache_dir.join(model.replace('/', "--"))
}

/// True when every file needed to load the model is present.
pub fn is_cached(model_dir: &Path) -> bool {
    REMOTE_FILES
        .iter()
        .all(|(_, local)| model_dir.join(local).exists())
}

fn file_url(base_url: &str, model: &str, remote: &str) -> String {
    format!("{}/{model}/resolve/main/{remote}", base_url.trim_end_matches('/'))
}

/// Download any missing model files into the cache. Returns the model directory.
pub async fn fetch_model(
    base_url: &str,
    cache_dir: &Path,
    model: &str,
    progress: bool,
) -> Result<PathBuf> {
    anyhow::ensure!(!model.trim().is_empty(), "model identifier must not be empty");

    let dir = model_dir(cache_dir, model);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;

    let client = reqwest::Client::new();
    for (remote, local) in REMOTE_FILES {
        let dest = dir.join(local);
        if dest.exists() {
            tracing::debug!(file = %dest.display(), "already cached");
            continue;
        }
        let url = file_url(base_url, model, remote);
        tracing::info!(%url, "downloading model file");
        download_file(&client, &url, &dest, progress).await?;
        tracing::info!(file = %dest.display(), "model file saved");
    }

    Ok(dir)
}

/// Download a file from a URL, optionally with a progress bar. Uses atomic write (tmp + rename).
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: bool,
) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = if !progress {
        ProgressBar::hidden()
    } else if let Some(size) = response.content_length() {
        let pb = ProgressBar::new(size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                .context("invalid progress template")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let tmp_path = dest.with_extension("tmp");
    let written = write_body(response, &tmp_path, &pb).await;
    if let Err(e) = written {
        pb.abandon();
        match tokio::fs::remove_file(&tmp_path).await {
            Ok(()) => tracing::debug!(file = %tmp_path.display(), "removed partial download"),
            Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
            Err(rm) => {
                tracing::warn!(file = %tmp_path.display(), error = %rm, "failed to remove partial download")
            }
        }
        return Err(e);
    }

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

/// Stream the response body to `path` chunk by chunk.
async fn write_body(mut response: reqwest::Response, path: &Path, pb: &ProgressBar) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create temp file: {}", path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    Ok(())
}
