use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod watcher;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Which traffic directions get logged at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingMode {
    None,
    #[default]
    All,
    Inbound,
    Outbound,
}

impl LoggingMode {
    pub fn logs_inbound(self) -> bool {
        matches!(self, LoggingMode::All | LoggingMode::Inbound)
    }

    pub fn logs_outbound(self) -> bool {
        matches!(self, LoggingMode::All | LoggingMode::Outbound)
    }
}

/// `inbound` honours the ignore list and reports elapsed time; `audit`
/// records every exchange without timing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerVariant {
    #[default]
    Inbound,
    Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub mode: LoggingMode,
    pub variant: LoggerVariant,
    pub ignore_routes: Vec<String>,
    pub include_request_body: bool,
    pub include_response_body: bool,
    pub max_body_bytes: usize,
    pub redact_headers: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: LoggingMode::default(),
            variant: LoggerVariant::default(),
            ignore_routes: Vec::new(),
            include_request_body: true,
            include_response_body: true,
            max_body_bytes: 64 * 1024,
            redact_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
                "proxy-authorization".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// `CONFIG_PATH` if set, otherwise [`DEFAULT_CONFIG_PATH`].
    pub fn config_path() -> String {
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false));
        Self::finish(builder)
    }

    /// Parses an inline YAML document, still applying environment overrides.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Yaml));
        Self::finish(builder)
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let mut builder = builder.add_source(
            config::Environment::with_prefix("TRAFFIC_LOG")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("logging.ignore_routes")
                .with_list_parse_key("logging.redact_headers")
                .try_parsing(true),
        );

        // Override with environment variables if present
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>()?)?;
        }
        if let Ok(metrics_port) = std::env::var("METRICS_PORT") {
            builder = builder.set_override("metrics.port", metrics_port.parse::<u16>()?)?;
        }

        let settings = builder.build()?;
        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }
}
