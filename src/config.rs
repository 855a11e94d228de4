use std::path::PathBuf;

use tracing::trace;

/// Daemon configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Seconds between sampling passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Where the snapshot log (one JSON snapshot per line) is written
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            history_path: default_history_path(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

pub fn default_history_path() -> PathBuf {
    PathBuf::from("./history.jsonl")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
