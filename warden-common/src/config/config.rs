use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize, Debug, Clone)]
pub struct WardenConfig {
    pub prefix: Prefixes,
    #[serde(default)]
    pub dispatch: DispatchAttributes,
    #[serde(default)]
    pub dev: DevAttributes,
}
impl WardenConfig {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<WardenConfig> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        let config = Self::from_toml_str(&raw)?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<WardenConfig> {
        toml::from_str::<WardenConfig>(raw).context("Failed to parse configuration")
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Prefixes {
    /// Text prefixes, tried in order. The first match wins.
    pub default: Vec<String>,
    /// Whether mentioning the bot works as a prefix. Requires `dispatch.bot_id`.
    #[serde(default = "enabled")]
    pub mention: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DispatchAttributes {
    pub invocation_timeout_ms: Option<u64>,
    /// Spawn a task per inbound event instead of awaiting each one in turn.
    #[serde(default)]
    pub concurrent: bool,
    pub bot_id: Option<u64>,
}
impl DispatchAttributes {
    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DevAttributes {
    #[serde(default)]
    pub owner_ids: Vec<u64>,
}

fn enabled() -> bool {
    true
}
