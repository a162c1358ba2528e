use anyhow::Context;
use serde::Deserialize;

/// Server configuration.
///
/// Loaded from a YAML file named by `HEARTH_CONFIG` when set, otherwise
/// built-in defaults; a `LISTEN` env var overrides the listen address either
/// way.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub upstream: UpstreamConfig,
}

/// The upstream the demo proxy route forwards to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://httpbin.org".to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("HEARTH_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            Err(_) => Config::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }
}
