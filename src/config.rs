use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::adapters::select_endpoint;
use crate::domain::{
    AnalystKind, ModelPair, ProviderIdentity, ReportLength, ResearchDepth, RunRequest,
};
use crate::error::Result;
use crate::protocol::DEFAULT_DECODE_FAILURE_THRESHOLD;
use crate::report::ExportLayout;
use crate::services::DEFAULT_ACTIVITY_CAPACITY;
use crate::session::SessionSettings;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub run: RunDefaults,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub export: ExportLayout,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// Explicit WebSocket URL; overrides origin-based resolution
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Origin the dashboard is served from, e.g. `https://dash.example.com`
    #[serde(default)]
    pub page_origin: Option<String>,
    /// Handshake limit. Unset waits indefinitely.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl BackendConfig {
    pub fn endpoint(&self) -> Result<String> {
        select_endpoint(self.ws_url.as_deref(), self.page_origin.as_deref())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Values pre-filled into a new run request
#[derive(Debug, Clone, Deserialize)]
pub struct RunDefaults {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default = "default_analysts")]
    pub analysts: Vec<String>,
    #[serde(default = "default_research_depth")]
    pub research_depth: u32,
    #[serde(default = "default_report_length")]
    pub report_length: String,
    #[serde(default = "default_provider")]
    pub llm_provider: String,
    #[serde(default = "default_provider_url")]
    pub backend_url: String,
    #[serde(default = "default_model")]
    pub shallow_thinker: String,
    #[serde(default = "default_model")]
    pub deep_thinker: String,
}

fn default_ticker() -> String {
    "SPY".to_string()
}

fn default_analysts() -> Vec<String> {
    AnalystKind::ALL.iter().map(|a| a.as_str().to_string()).collect()
}

fn default_research_depth() -> u32 {
    ResearchDepth::MEDIUM.rounds()
}

fn default_report_length() -> String {
    ReportLength::default().as_str().to_string()
}

fn default_provider() -> String {
    ProviderIdentity::default().name
}

fn default_provider_url() -> String {
    ProviderIdentity::default().backend_url
}

fn default_model() -> String {
    ModelPair::default().shallow
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            analysts: default_analysts(),
            research_depth: default_research_depth(),
            report_length: default_report_length(),
            llm_provider: default_provider(),
            backend_url: default_provider_url(),
            shallow_thinker: default_model(),
            deep_thinker: default_model(),
        }
    }
}

impl RunDefaults {
    /// Build a validated request; `ticker` overrides the configured default
    pub fn request(&self, ticker: Option<&str>, analysis_date: &str) -> Result<RunRequest> {
        let analysts = self
            .analysts
            .iter()
            .map(|a| AnalystKind::try_from(a.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let report_length = ReportLength::try_from(self.report_length.as_str())?;

        RunRequest::builder(ticker.unwrap_or(&self.ticker), analysis_date)
            .report_length(report_length)
            .analysts(analysts)
            .research_depth(self.research_depth)
            .provider(ProviderIdentity {
                name: self.llm_provider.clone(),
                backend_url: self.backend_url.clone(),
            })
            .models(ModelPair {
                shallow: self.shallow_thinker.clone(),
                deep: self.deep_thinker.clone(),
            })
            .build()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Consecutive undecodable frames before the run is failed
    #[serde(default = "default_decode_failure_threshold")]
    pub decode_failure_threshold: u32,
    #[serde(default = "default_activity_log_capacity")]
    pub activity_log_capacity: usize,
}

fn default_decode_failure_threshold() -> u32 {
    DEFAULT_DECODE_FAILURE_THRESHOLD
}

fn default_activity_log_capacity() -> usize {
    DEFAULT_ACTIVITY_CAPACITY
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            decode_failure_threshold: default_decode_failure_threshold(),
            activity_log_capacity: default_activity_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default(
                "protocol.decode_failure_threshold",
                i64::from(DEFAULT_DECODE_FAILURE_THRESHOLD),
            )?
            .set_default("export.lines_per_page", 50)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/staging.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADEBOARD_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TRADEBOARD__BACKEND__WS_URL, etc.)
            .add_source(
                Environment::with_prefix("TRADEBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration used when no files are present
    pub fn default_config() -> Self {
        Self {
            backend: BackendConfig::default(),
            run: RunDefaults::default(),
            protocol: ProtocolConfig::default(),
            export: ExportLayout::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Controller settings derived from this configuration
    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            endpoint: self.backend.endpoint()?,
            decode_failure_threshold: self.protocol.decode_failure_threshold,
            activity_capacity: self.protocol.activity_log_capacity,
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.backend.endpoint() {
            errors.push(e.to_string());
        }
        if let Some(url) = self.backend.ws_url.as_deref() {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                errors.push(format!("backend.ws_url must use ws:// or wss://, got '{}'", url));
            }
        }
        if self.backend.connect_timeout_secs == Some(0) {
            errors.push("backend.connect_timeout_secs must be positive".to_string());
        }

        if self.run.analysts.is_empty() {
            errors.push("run.analysts must not be empty".to_string());
        }
        for analyst in &self.run.analysts {
            if let Err(e) = AnalystKind::try_from(analyst.as_str()) {
                errors.push(e.to_string());
            }
        }
        if let Err(e) = ResearchDepth::new(self.run.research_depth) {
            errors.push(e.to_string());
        }
        if let Err(e) = ReportLength::try_from(self.run.report_length.as_str()) {
            errors.push(e.to_string());
        }

        if self.protocol.decode_failure_threshold == 0 {
            errors.push("protocol.decode_failure_threshold must be at least 1".to_string());
        }
        if self.protocol.activity_log_capacity == 0 {
            errors.push("protocol.activity_log_capacity must be at least 1".to_string());
        }
        if self.export.lines_per_page < 10 {
            errors.push("export.lines_per_page must be at least 10".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
