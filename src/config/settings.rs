use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use url::Url;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    pub hec: HecConfig,

    pub cold_storage: Option<StorageConfig>,
    pub failure_storage: Option<StorageConfig>,

    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HecConfig {
    pub endpoints: Vec<String>,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_tls_skip_verify")]
    pub tls_skip_verify: bool,

    pub proxy: Option<String>,

    /// Collector channel identifier; a fresh UUID is generated at startup when
    /// unset or not a syntactically valid UUID.
    pub channel_id: Option<String>,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default = "default_sourcetype")]
    pub sourcetype: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    #[serde(default = "default_balance_strategy")]
    pub balance_strategy: String,

    #[serde(default = "default_sticky_ttl_ms")]
    pub sticky_ttl_ms: u64,

    #[serde(default)]
    pub extract_log_events: bool,

    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    pub url: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_storage_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions for serde
fn default_tls_skip_verify() -> bool {
    true
}
fn default_index() -> String {
    "main".to_string()
}
fn default_source() -> String {
    "hecfowd".to_string()
}
fn default_sourcetype() -> String {
    "hecfowd".to_string()
}
fn default_host() -> String {
    "serverless".to_string()
}
fn default_batch_size() -> usize {
    1
}
fn default_batch_timeout_ms() -> u64 {
    2000
}
fn default_balance_strategy() -> String {
    "roundrobin".to_string()
}
fn default_sticky_ttl_ms() -> u64 {
    300_000
}
fn default_health_interval_ms() -> u64 {
    10_000
}
fn default_key_prefix() -> String {
    "events".to_string()
}
fn default_storage_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "simple".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = std::env::var("CFG_PATH").unwrap_or_else(|_| "./config.json".to_string());
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_hec()?;
        self.validate_storage()?;
        self.validate_logging()?;
        Ok(())
    }

    fn validate_hec(&self) -> Result<()> {
        let hec = &self.hec;

        if hec.endpoints.is_empty() || hec.endpoints.iter().all(|e| e.is_empty()) {
            bail!("at least one HEC endpoint must be configured");
        }

        for endpoint in &hec.endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                bail!(
                    "HEC endpoint must start with http:// or https://, got: '{}'",
                    endpoint
                );
            }

            if endpoint.contains(' ') {
                bail!("HEC endpoint URL cannot contain spaces, got: '{}'", endpoint);
            }
        }

        if let Some(proxy) = &hec.proxy {
            Url::parse(proxy).with_context(|| format!("invalid proxy URL: '{}'", proxy))?;
        }

        if hec.batch_timeout_ms == 0 {
            bail!("hec.batch_timeout_ms must be greater than 0");
        }

        if hec.sticky_ttl_ms == 0 {
            bail!("hec.sticky_ttl_ms must be greater than 0");
        }

        if hec.health_interval_ms == 0 {
            bail!(
                "hec.health_interval_ms must be greater than 0. Zero causes tokio::time::interval panic."
            );
        }

        // Unknown balance_strategy names are deliberately not rejected here:
        // the selector falls back to first_available with a warning at runtime.

        Ok(())
    }

    fn validate_storage(&self) -> Result<()> {
        for (name, storage) in [
            ("cold_storage", &self.cold_storage),
            ("failure_storage", &self.failure_storage),
        ] {
            if let Some(storage) = storage {
                if !storage.url.starts_with("http://") && !storage.url.starts_with("https://") {
                    bail!(
                        "{}.url must start with http:// or https://, got: '{}'",
                        name,
                        storage.url
                    );
                }

                if storage.request_timeout_ms == 0 {
                    bail!("{}.request_timeout_ms must be greater than 0", name);
                }
            }
        }

        Ok(())
    }

    fn validate_logging(&self) -> Result<()> {
        if let Some(logging) = &self.logging {
            const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
            if !VALID_LEVELS.contains(&logging.log_level.as_str()) {
                bail!(
                    "logging.log_level must be one of {:?}, got: '{}'",
                    VALID_LEVELS,
                    logging.log_level
                );
            }

            const VALID_FORMATS: &[&str] = &["simple", "json"];
            if !VALID_FORMATS.contains(&logging.log_format.as_str()) {
                bail!(
                    "logging.log_format must be one of {:?}, got: '{}'",
                    VALID_FORMATS,
                    logging.log_format
                );
            }
        }

        Ok(())
    }
}
