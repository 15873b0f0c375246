pub mod crop;
pub mod lines;
pub mod pages;
pub mod split;
pub mod table;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use mindee::{Client, ClientConfig, LocalInputSource};

/// Parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

pub fn load_source(path: &Path) -> Result<LocalInputSource> {
    LocalInputSource::from_path(path).with_context(|| format!("failed to load {}", path.display()))
}

/// API client from the config file and environment.
pub fn remote_client() -> Result<Client> {
    let config = ClientConfig::load().context("failed to load configuration")?;
    Client::new(&config).context("API client not configured")
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}
