use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Service root of the server, including the base path.
    pub server_url: String,
    /// Wire encoding for outgoing messages, "application/json" or
    /// "application/xml".
    pub content_type: String,
    /// How often a data report goes out.
    pub report_interval_ms: u64,
    /// Fallback heartbeat interval, used when `/server/info` is unreachable.
    pub heart_beat_interval_ms: u64,
    /// Pause between registering schemas and resending rejected data.
    pub settle_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8095/services/mid".into(),
            content_type: "application/json".into(),
            report_interval_ms: 5_000,
            heart_beat_interval_ms: 30_000,
            settle_delay_ms: 500,
        }
    }
}

/// Load the config from `$MACHBUS_AGENT_CONFIG` (default `machbus-agent.yaml`),
/// falling back to defaults when the file is missing or invalid.
pub async fn load_config() -> AgentConfig {
    let path = std::env::var("MACHBUS_AGENT_CONFIG").unwrap_or_else(|_| "machbus-agent.yaml".into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> AgentConfig {
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return AgentConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return AgentConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), "invalid config ({e}), using defaults");
        AgentConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let cfg = load_config_from(Path::new("/nonexistent/machbus-agent.yaml")).await;
        assert_eq!(cfg.server_url, "http://localhost:8095/services/mid");
        assert_eq!(cfg.settle_delay_ms, 500);
    }

    #[tokio::test]
    async fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url: http://10.0.0.5:8095/services/mid\ncontent_type: application/xml").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.server_url, "http://10.0.0.5:8095/services/mid");
        assert_eq!(cfg.content_type, "application/xml");
        assert_eq!(cfg.report_interval_ms, 5_000);
    }
}
