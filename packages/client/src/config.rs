use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::StorageAppConfig;
pub use common::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Pause between clearing a desynced provider session and the single
    /// sign-in retry. Default: 300.
    #[serde(default = "default_desync_retry_delay_ms")]
    pub desync_retry_delay_ms: u64,
}

fn default_desync_retry_delay_ms() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            desync_retry_delay_ms: default_desync_retry_delay_ms(),
        }
    }
}

impl SessionConfig {
    pub fn desync_retry_delay(&self) -> Duration {
        Duration::from_millis(self.desync_retry_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProfileConfig {
    /// Domain required for student school addresses. Default: "g.gcksp12.org".
    #[serde(default = "default_school_email_domain")]
    pub school_email_domain: String,
}

fn default_school_email_domain() -> String {
    "g.gcksp12.org".into()
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            school_email_domain: default_school_email_domain(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub query: RetryPolicy,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("BRIDGE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("query.max_retries", 3_i64)?
            .set_default("query.base_delay_ms", 1000_i64)?
            .set_default("query.max_delay_ms", 30_000_i64)?
            .set_default("session.desync_retry_delay_ms", 300_i64)?
            .set_default("storage.max_blob_bytes", 10 * 1024 * 1024_i64)?
            .set_default("profile.school_email_domain", "g.gcksp12.org")?
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., BRIDGE__QUERY__MAX_RETRIES)
            .add_source(Environment::with_prefix("BRIDGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
