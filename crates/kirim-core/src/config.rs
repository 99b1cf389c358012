use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default scheduler poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// Default number of days ahead for which jobs are pre-materialized.
pub const DEFAULT_HORIZON_DAYS: u32 = 30;
/// Hard ceiling for a single job's dispatch (resolve + fetch + send).
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 120;

/// Top-level config (kirim.toml + KIRIM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KirimConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub app: AppConfig,
}

impl Default for KirimConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            scheduler: SchedulerConfig::default(),
            app: AppConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on POST /api/scheduler/run.
    #[serde(default = "default_cron_secret")]
    pub cron_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            cron_secret: default_cron_secret(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Connection settings for the WhatsApp session bridge.
///
/// The bridge is a separate process that owns the paired WhatsApp session
/// (QR pairing, reconnects, rate limiting). Kirim only speaks HTTP to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Per-request timeout for bridge calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for downloading media bytes before a send, in seconds.
    #[serde(default = "default_media_timeout")]
    pub media_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            request_timeout_secs: default_request_timeout(),
            media_timeout_secs: default_media_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// A hung dispatch is demoted to FAILED after this many seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            horizon_days: default_horizon_days(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// IANA timezone all calendar math runs in (day boundaries,
    /// day-of-month extraction, time-of-day overlay).
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    8330
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_cron_secret() -> String {
    "change-me".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.kirim/kirim.db", home)
}
fn default_bridge_url() -> String {
    "http://127.0.0.1:3001".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_media_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}
fn default_job_timeout() -> u64 {
    DEFAULT_JOB_TIMEOUT_SECS
}
fn default_timezone() -> String {
    "Asia/Pontianak".to_string()
}

impl KirimConfig {
    /// Load config from a TOML file with KIRIM_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.kirim/kirim.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: KirimConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("KIRIM_").split("_"))
            .extract()
            .map_err(|e| crate::error::KirimError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Parse the configured IANA timezone name.
    pub fn timezone(&self) -> crate::error::Result<chrono_tz::Tz> {
        self.app
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| crate::error::KirimError::InvalidTimezone(self.app.timezone.clone()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.kirim/kirim.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = KirimConfig::default();
        assert_eq!(cfg.scheduler.horizon_days, 30);
        assert_eq!(cfg.scheduler.poll_interval_secs, 60);
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.app.timezone, "Asia/Pontianak");
    }

    #[test]
    fn default_timezone_parses() {
        let cfg = KirimConfig::default();
        assert!(cfg.timezone().is_ok());
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let mut cfg = KirimConfig::default();
        cfg.app.timezone = "Mars/Olympus_Mons".to_string();
        assert!(cfg.timezone().is_err());
    }
}
