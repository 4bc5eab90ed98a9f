use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Cross-origin settings for browser players
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Comma-separated list of exact origins (e.g. `https://player.example.com`)
    pub allowed_origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: "http://localhost:5173".to_string(),
        }
    }
}

/// How outbound fetches reach the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamPolicy {
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY`
    #[default]
    Environment,
    /// Always connect to the origin directly
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Maximum number of simultaneous upstream fetches
    pub max_concurrent_fetches: usize,
    /// Reject requests without `X-Terms-Accepted: true`
    pub require_terms_accepted: bool,
    /// User-Agent presented to origins
    pub user_agent: String,
    pub connect_timeout_seconds: u64,
    pub upstream_policy: UpstreamPolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 5,
            require_terms_accepted: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            connect_timeout_seconds: 10,
            upstream_policy: UpstreamPolicy::Environment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    /// Rotated JSON log file, written in addition to the console
    pub file_path: Option<String>,
    /// Rotated files kept on disk
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
            max_files: 3,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Deployment variables `PROXY_PORT`, `ALLOWED_ORIGINS`, `LOG_PATH` (highest priority)
    /// 2. Environment variables (`HLSRELAY_SERVER__PORT`, etc.)
    /// 3. Config file (if provided)
    /// 4. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with(config_file, |name| std::env::var(name).ok())
    }

    /// `load` with the deployment variables read through `lookup`.
    ///
    /// An empty deployment variable counts as unset.
    fn load_with(
        config_file: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let deployment_var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("HLSRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_override_option("server.port", deployment_var("PROXY_PORT"))?
            .set_override_option("cors.allowed_origins", deployment_var("ALLOWED_ORIGINS"))?
            .set_override_option("logging.file_path", deployment_var("LOG_PATH"))?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check values that would only fail later at runtime
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }
        if self.proxy.max_concurrent_fetches == 0 {
            errors.push("proxy.max_concurrent_fetches must be greater than 0".to_string());
        }
        if self.proxy.user_agent.trim().is_empty() {
            errors.push("proxy.user_agent must not be empty".to_string());
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            errors.push(format!("logging.level {:?} is not a valid level", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format {:?} must be \"json\" or \"pretty\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
