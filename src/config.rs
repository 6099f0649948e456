use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScatterConfig {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub projection: ProjectionConfig,
    pub plot: PlotConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Model identifier preselected for new sessions, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    pub model: Option<String>,
    /// Output dimension; the model's native size when unset.
    pub dimensions: Option<usize>,
    pub cache_dir: String,
    pub max_seq_len: usize,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Near-neighbour count; derived from the corpus size when unset.
    pub n_neighbors: Option<usize>,
    pub mn_ratio: f32,
    pub fp_ratio: f32,
    pub num_iters: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlotConfig {
    pub wrap_width: usize,
    pub colormap: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_scatterbrain_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: None,
            dimensions: None,
            cache_dir,
            max_seq_len: 512,
            base_url: "https://huggingface.co".into(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 20,
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_neighbors: None,
            mn_ratio: 0.5,
            fp_ratio: 2.0,
            num_iters: 450,
            learning_rate: 1.0,
            seed: 42,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            wrap_width: 100,
            colormap: "mako".into(),
        }
    }
}

/// Returns `~/.scatterbrain/`
pub fn default_scatterbrain_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scatterbrain")
}

/// Returns the default config file path: `~/.scatterbrain/config.toml`
pub fn default_config_path() -> PathBuf {
    default_scatterbrain_dir().join("config.toml")
}

impl ScatterConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ScatterConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (SCATTERBRAIN_LOG_LEVEL, SCATTERBRAIN_PORT, SCATTERBRAIN_MODEL, SCATTERBRAIN_CACHE_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCATTERBRAIN_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SCATTERBRAIN_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid SCATTERBRAIN_PORT"),
            }
        }
        if let Ok(val) = std::env::var("SCATTERBRAIN_MODEL") {
            self.embedding.model = Some(val);
        }
        if let Ok(val) = std::env::var("SCATTERBRAIN_CACHE_DIR") {
            self.embedding.cache_dir = val;
        }
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.embedding.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
