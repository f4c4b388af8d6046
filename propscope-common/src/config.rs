//! Service configuration loading and resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment values arrive together through
//! [`ConfigOverrides`] (clap reads both); the TOML file is located by
//! [`resolve_config_path`] with the same priority order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "PROPSCOPE_CONFIG";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
/// Server-side ceiling on a live-update connection (15 minutes)
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Path of the workflow callback route, relative to the public base URL
pub const CALLBACK_PATH: &str = "/api/callback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "propscope_api=info,tower_http=info".to_string(),
        }
    }
}

/// Full service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Externally reachable base URL used to build the callback URL
    pub public_base_url: Option<String>,
    /// Workflow engine webhook that starts an analysis
    pub workflow_webhook_url: Option<String>,
    /// Skip the outbound webhook call on trigger
    pub test_mode: bool,
    /// Enable development-only routes (simulate-callback)
    pub dev_routes: bool,
    pub history_capacity: usize,
    pub stream_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    /// Timeout for outbound HTTP calls (webhook, CSV proxy)
    pub upstream_timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_base_url: None,
            workflow_webhook_url: None,
            test_mode: false,
            dev_routes: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            logging: LoggingConfig::default(),
        }
    }
}

/// Values from the command line or environment; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<String>,
    pub public_base_url: Option<String>,
    pub workflow_webhook_url: Option<String>,
    pub test_mode: Option<bool>,
    pub dev_routes: Option<bool>,
    pub log_level: Option<String>,
}

impl ServiceConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Resolve the full configuration: overrides, then file, then defaults
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_addr) = overrides.bind_addr {
            self.bind_addr = bind_addr;
        }
        if let Some(url) = overrides.public_base_url {
            self.public_base_url = Some(url);
        }
        if let Some(url) = overrides.workflow_webhook_url {
            self.workflow_webhook_url = Some(url);
        }
        if let Some(test_mode) = overrides.test_mode {
            self.test_mode = test_mode;
        }
        if let Some(dev_routes) = overrides.dev_routes {
            self.dev_routes = dev_routes;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(Error::Config("history_capacity must be at least 1".to_string()));
        }
        if self.stream_timeout_secs == 0 || self.heartbeat_interval_secs == 0 {
            return Err(Error::Config(
                "stream_timeout_secs and heartbeat_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(Error::Config("upstream_timeout_secs must be non-zero".to_string()));
        }
        for (name, value) in [
            ("public_base_url", &self.public_base_url),
            ("workflow_webhook_url", &self.workflow_webhook_url),
        ] {
            if let Some(url) = value {
                if !is_http_url(url) {
                    return Err(Error::Config(format!(
                        "{} must be an http(s) URL, got '{}'",
                        name, url
                    )));
                }
            }
        }
        Ok(())
    }

    /// Externally reachable base URL, without a trailing slash
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let port = self
                    .bind_addr
                    .rsplit_once(':')
                    .map(|(_, port)| port)
                    .unwrap_or("5000");
                format!("http://localhost:{}", port)
            }
        }
    }

    /// URL the workflow engine calls back with started/complete payloads
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.public_base_url(), CALLBACK_PATH)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Absolute http(s) URL with a host
fn is_http_url(value: &str) -> bool {
    Url::parse(value.trim()).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

/// Locate the TOML config file.
///
/// 1. Explicit path from the command line
/// 2. `PROPSCOPE_CONFIG` environment variable
/// 3. `~/.config/propscope/config.toml` when it exists
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path().filter(|p| p.exists())
}

/// Platform config location, e.g. `~/.config/propscope/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("propscope").join("config.toml"))
}
