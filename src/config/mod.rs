// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(path, &contents)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(path: &Path, contents: &str) -> Result<Config> {
    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        }
        _ => serde_json::from_str(contents).context("Failed to parse JSON config")?,
    };
    Ok(config)
}

/// Build configuration from `PORT`, `ADDRS`, `LOGFILE` and `STRATEGY`.
pub fn from_env() -> Result<Config> {
    from_vars(std::env::vars())
}

pub fn from_vars<I>(vars: I) -> Result<Config>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();

    let port: u16 = vars
        .get("PORT")
        .context("PORT is not set")?
        .trim()
        .parse()
        .context("PORT is not a number")?;
    if port <= 1000 || port == u16::MAX {
        bail!("PORT {} out of range (1001..=65534)", port);
    }

    let addrs: Vec<String> = vars
        .get("ADDRS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    if addrs.is_empty() {
        bail!("no addresses in ADDRS");
    }

    let mut config = Config::with_backends(addrs);
    config.server.port = port;

    if let Some(file) = vars.get("LOGFILE").filter(|f| !f.is_empty()) {
        config.logging.file = Some(file.into());
    }
    if let Some(strategy) = vars.get("STRATEGY") {
        config.balancer.strategy = strategy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if config.metrics.port == config.server.port {
        config.metrics.port = config.server.port.saturating_add(1);
    }

    config.validate()?;
    Ok(config)
}
