use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Server settings, loaded from a YAML file.
///
/// The defaults match what deployed agents expect; overriding `base_path`
/// or `port` requires reconfiguring every agent as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub base_path: String,
    /// Interval agents should report with, announced via `/server/info`.
    pub heart_beat_interval_ms: u64,
    /// How often the liveness sweep runs.
    pub sweep_interval_ms: u64,
    /// Silence after which a machine counts as lost.
    pub machine_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8095,
            base_path: "/services/mid".into(),
            heart_beat_interval_ms: 30_000,
            sweep_interval_ms: 10_000,
            machine_timeout_ms: 90_000,
        }
    }
}

/// Load the config from `$MACHBUS_SERVER_CONFIG` (default `machbus.yaml`),
/// falling back to defaults when the file is missing or invalid.
pub async fn load_config() -> ServerConfig {
    let path = std::env::var("MACHBUS_SERVER_CONFIG").unwrap_or_else(|_| "machbus.yaml".into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> ServerConfig {
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return ServerConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return ServerConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), "invalid config ({e}), using defaults");
        ServerConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let cfg = load_config_from(Path::new("/nonexistent/machbus.yaml")).await;
        assert_eq!(cfg.port, 8095);
        assert_eq!(cfg.base_path, "/services/mid");
        assert_eq!(cfg.heart_beat_interval_ms, 30_000);
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: 9000\nmachine_timeout_ms: 120000").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.machine_timeout_ms, 120_000);
        assert_eq!(cfg.base_path, "/services/mid");
    }

    #[tokio::test]
    async fn garbage_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: [not a number").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.port, 8095);
    }
}
