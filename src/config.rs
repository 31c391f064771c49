use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Runtime configuration, loaded once from the environment with the
/// `HAVEN_` prefix layered over compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,

    /// Base URL of the remote credential authority. Unset means the last
    /// locally stored credential is trusted without re-verification.
    pub authority_url: Option<Url>,
    pub authority_api_key: Option<String>,
    pub credential_ttl_secs: u64,

    pub base_quota_bytes: u64,
    pub subscriber_quota_bytes: u64,
    pub max_save_bytes: u64,
    pub max_level_bytes: u64,

    /// Minimum seconds between accepted writes per account. 0 disables.
    pub min_save_interval_secs: u64,
    /// When true, the throttle window is consumed only after a durable write
    /// instead of at admission time.
    pub throttle_mark_on_success: bool,

    pub retention_days: i64,
    pub sweep_interval_secs: u64,

    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:haven.sqlite".to_string(),
            listen_addr: "0.0.0.0:3001".to_string(),
            loglevel: "info".to_string(),
            authority_url: None,
            authority_api_key: None,
            credential_ttl_secs: 300,
            base_quota_bytes: 33_554_432,
            subscriber_quota_bytes: 134_217_728,
            max_save_bytes: 16_777_216,
            max_level_bytes: 33_554_432,
            min_save_interval_secs: 5,
            throttle_mark_on_success: false,
            retention_days: 100,
            sweep_interval_secs: 86_400,
            db_max_connections: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("HAVEN_"))
            .extract()
            .expect("FATAL: invalid HAVEN_* configuration")
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn min_save_interval(&self) -> Duration {
        Duration::from_secs(self.min_save_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Request body ceiling for the router: both payloads plus JSON framing.
    pub fn body_limit_bytes(&self) -> usize {
        (self.max_save_bytes + self.max_level_bytes) as usize + 1_048_576
    }
}

pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_env);
