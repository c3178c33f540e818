//! Configuration loading for varprio.
//!
//! Reads `varprio.toml` from an explicit path, the path in the
//! `VARPRIO_CONFIG` env var, or the current directory. Every field has a
//! default, so an empty file (or no file at all) yields a runnable config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, VarprioError};

pub const CONFIG_ENV_VAR: &str = "VARPRIO_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "varprio.toml";

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

// ── Ingestion ─────────────────────────────────────────────────────────────────

/// What to do with a malformed VCF data line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseModeSetting {
    /// Abort the whole parse on the first malformed line.
    #[default]
    Strict,
    /// Log and skip malformed lines.
    Lenient,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default)]
    pub mode: ParseModeSetting,
}

// ── Providers ─────────────────────────────────────────────────────────────────

/// Settings shared by every annotation provider.
///
/// `base_url` and `timeout_secs` are optional here because their defaults
/// differ per provider; each source resolves its own fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub base_url: Option<String>,

    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { enabled: true, base_url: None, timeout_secs: None }
    }
}

impl ProviderConfig {
    pub fn base_url_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(fallback)
    }

    pub fn timeout_or(&self, fallback_secs: u64) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(fallback_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub clinvar: ProviderConfig,

    #[serde(default)]
    pub gnomad: ProviderConfig,

    #[serde(default)]
    pub cadd: ProviderConfig,

    #[serde(default)]
    pub vep: ProviderConfig,

    /// gnomAD dataset queried by the population-frequency provider
    #[serde(default = "default_gnomad_dataset")]
    pub gnomad_dataset: String,

    /// Ensembl species path segment for VEP
    #[serde(default = "default_vep_species")]
    pub vep_species: String,
}

fn default_true() -> bool { true }
fn default_gnomad_dataset() -> String { "gnomad_r2_1".to_string() }
fn default_vep_species() -> String { "human".to_string() }

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            clinvar: ProviderConfig::default(),
            gnomad: ProviderConfig::default(),
            cadd: ProviderConfig::default(),
            vep: ProviderConfig::default(),
            gnomad_dataset: default_gnomad_dataset(),
            vep_species: default_vep_species(),
        }
    }
}

impl ProvidersConfig {
    /// All configured base URLs, used to extend the network allowlist.
    pub fn custom_base_urls(&self) -> impl Iterator<Item = &str> {
        [&self.clinvar, &self.gnomad, &self.cadd, &self.vep]
            .into_iter()
            .filter_map(|p| p.base_url.as_deref())
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 8_000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionModeSetting {
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionModeSetting,

    /// Variants annotated at once in concurrent mode.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Per-call ceiling applied by the orchestrator on top of provider timeouts.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Deadline for the whole annotation stage; unset means no deadline.
    pub overall_timeout_secs: Option<u64>,
}

fn default_max_in_flight() -> usize { 4 }
fn default_call_timeout_secs() -> u64 { 60 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionModeSetting::default(),
            max_in_flight: default_max_in_flight(),
            call_timeout_secs: default_call_timeout_secs(),
            overall_timeout_secs: None,
        }
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub extra_allowed_domains: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("varprio/{} (variant annotation)", env!("CARGO_PKG_VERSION"))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { extra_allowed_domains: vec![], user_agent: default_user_agent() }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    /// Load configuration.
    ///
    /// An explicit path or `VARPRIO_CONFIG` must point at an existing file;
    /// a missing `varprio.toml` in the working directory falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok();
        let requested = explicit
            .map(|p| p.to_path_buf())
            .or_else(|| env_path.map(Into::into));

        let config = match requested {
            Some(path) => {
                if !path.exists() {
                    return Err(VarprioError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(&path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VarprioError::Config(e.to_string()))
    }

    /// Reject settings that would make the pipeline hang or do nothing.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(VarprioError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.execution.max_in_flight == 0 {
            return Err(VarprioError::Config("execution.max_in_flight must be at least 1".into()));
        }
        if self.execution.call_timeout_secs == 0 {
            return Err(VarprioError::Config("execution.call_timeout_secs must be positive".into()));
        }
        if self.execution.overall_timeout_secs == Some(0) {
            return Err(VarprioError::Config("execution.overall_timeout_secs must be positive".into()));
        }
        let providers = [
            ("clinvar", &self.providers.clinvar),
            ("gnomad", &self.providers.gnomad),
            ("cadd", &self.providers.cadd),
            ("vep", &self.providers.vep),
        ];
        for (name, provider) in providers {
            if provider.timeout_secs == Some(0) {
                return Err(VarprioError::Config(format!(
                    "providers.{name}.timeout_secs must be positive"
                )));
            }
        }
        Ok(())
    }
}
