//! Herald configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HeraldError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl HeraldConfig {
    /// Load config from the default path (~/.herald/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parse config from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HeraldError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| HeraldError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Reject values the schedulers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.distribution.pool_size == 0 {
            return Err(HeraldError::Config("distribution.pool_size must be at least 1".into()));
        }
        if self.distribution.normal_sweep_interval_ms == 0
            || self.distribution.normal_resend_interval_ms == 0
        {
            return Err(HeraldError::Config("sweep intervals must be positive".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Herald home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
    }
}

/// Retry, escalation and sweep settings consumed by the schedulers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Max resends before a critical transmission escalates; also the
    /// eligibility cutoff for the normal resend sweep.
    #[serde(default = "default_resend_limit")]
    pub resend_limit: u32,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_critical_resend_delay_ms")]
    pub critical_resend_delay_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub normal_sweep_interval_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub normal_resend_interval_ms: u64,
}

fn default_resend_limit() -> u32 { 2 }
fn default_pool_size() -> usize { 8 }
fn default_critical_resend_delay_ms() -> u64 { 10_000 }
fn default_sweep_interval_ms() -> u64 { 10_000 }

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            resend_limit: default_resend_limit(),
            pool_size: default_pool_size(),
            critical_resend_delay_ms: default_critical_resend_delay_ms(),
            normal_sweep_interval_ms: default_sweep_interval_ms(),
            normal_resend_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl DistributionConfig {
    pub fn critical_resend_delay(&self) -> Duration {
        Duration::from_millis(self.critical_resend_delay_ms)
    }

    pub fn normal_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.normal_sweep_interval_ms)
    }

    pub fn normal_resend_interval(&self) -> Duration {
        Duration::from_millis(self.normal_resend_interval_ms)
    }
}

/// Outbound SMTP relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "bool_true")]
    pub starttls: bool,
    #[serde(default = "default_mail_sender")]
    pub sender: String,
    #[serde(default = "default_mail_subject")]
    pub subject: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn bool_true() -> bool { true }
fn default_smtp_host() -> String { "localhost".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_mail_sender() -> String { "Herald <herald@localhost>".into() }
fn default_mail_subject() -> String { "Herald Notification".into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            starttls: true,
            sender: default_mail_sender(),
            subject: default_mail_subject(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Outbound REST callback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout_secs() }
    }
}

impl RestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Age-based cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Records modified longer ago than this are removed by a default cleanup.
    #[serde(default = "default_cleanup_age_ms")]
    pub default_age_ms: u64,
}

fn default_cleanup_age_ms() -> u64 { 30 * 24 * 60 * 60 * 1000 }

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { default_age_ms: default_cleanup_age_ms() }
    }
}

impl CleanupConfig {
    pub fn default_age(&self) -> Duration {
        Duration::from_millis(self.default_age_ms)
    }
}

/// Gateway (HTTP API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest `limit` a list query may ask for.
    #[serde(default = "default_read_limit")]
    pub read_limit: usize,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 48060 }
fn default_read_limit() -> usize { 100 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_limit: default_read_limit(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.herald/herald.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}
