//! `model` subcommands: download and check the local encoder cache.

use anyhow::{Context, Result};

use scatterbrain::config::ScatterConfig;
use scatterbrain::embedding::{self, download, EncoderSpec};

/// Model from the command line, else the configured default.
fn resolve_model(config: &ScatterConfig, model: Option<&str>) -> Result<String> {
    model
        .map(str::to_string)
        .or_else(|| config.embedding.model.clone())
        .context("no model given; pass --model or set embedding.model in config.toml")
}

/// Download the ONNX model and tokenizer to the cache directory.
pub async fn model_download(config: &ScatterConfig, model: Option<&str>) -> Result<()> {
    let model = resolve_model(config, model)?;
    let cache_dir = config.resolved_cache_dir();

    println!("Downloading {model} to {}...", cache_dir.display());
    let dir = download::fetch_model(&config.embedding.base_url, &cache_dir, &model, true)
        .await
        .with_context(|| format!("failed to download {model}"))?;

    println!("Model files saved to {}", dir.display());
    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Try a cache-only load of the model and print its status.
pub fn model_check(config: &ScatterConfig, model: Option<&str>) -> Result<()> {
    let model = resolve_model(config, model)?;
    let provider = embedding::create_provider(&config.embedding)?;
    let spec = EncoderSpec {
        model: model.clone(),
        dimensions: config.embedding.dimensions,
    };

    match provider.load_cached(&spec)? {
        Some(encoder) => {
            println!("Model:       {model}");
            println!("Status:      loaded");
            println!("Dimensions:  {}", encoder.dimensions());
        }
        None => {
            println!("Model:       {model}");
            println!("Status:      not downloaded");
            println!("Run `scatterbrain model download --model {model}` to fetch it.");
        }
    }
    Ok(())
}
