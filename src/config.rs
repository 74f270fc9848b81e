use anyhow::{Context, Result};
use std::{env, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Order/top-up fulfillment backend
    pub fulfillment: FulfillmentConfig,

    /// VPN node directory service
    pub directory: DirectoryConfig,

    /// Status polling cadence and budget
    pub polling: PollingConfig,

    /// Node probe bounds
    pub discovery: DiscoveryConfig,
}

#[derive(Clone, Debug)]
pub struct FulfillmentConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    pub url: String,
}

#[derive(Clone, Copy, Debug)]
pub struct PollingConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

#[derive(Clone, Copy, Debug)]
pub struct DiscoveryConfig {
    pub probe_timeout: Duration,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it
    /// loads all configuration from environment variables. Subsequent calls
    /// return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. This is intentional as the
    /// application cannot function without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    fn load_internal() -> Result<Self> {
        Ok(Self {
            fulfillment: FulfillmentConfig::load()?,
            directory: DirectoryConfig::load()?,
            polling: PollingConfig::load()?,
            discovery: DiscoveryConfig::load()?,
        })
    }
}

impl FulfillmentConfig {
    fn load() -> Result<Self> {
        let base_url = env::var("FULFILLMENT_URL")
            .unwrap_or_else(|_| "https://fulfillment.roamsim.app".to_string());

        Ok(Self { base_url })
    }
}

impl DirectoryConfig {
    fn load() -> Result<Self> {
        let url = env::var("NODE_DIRECTORY_URL")
            .unwrap_or_else(|_| "https://directory.roamsim.app/v1/nodes".to_string());

        Ok(Self { url })
    }
}

impl PollingConfig {
    fn load() -> Result<Self> {
        Ok(Self {
            interval: duration_secs_var("POLL_INTERVAL_SECS", 5)?,
            timeout: duration_secs_var("POLL_TIMEOUT_SECS", 600)?,
        })
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

impl DiscoveryConfig {
    fn load() -> Result<Self> {
        Ok(Self {
            probe_timeout: duration_secs_var("PROBE_TIMEOUT_SECS", 10)?,
        })
    }
}

fn duration_secs_var(name: &str, default_secs: u64) -> Result<Duration> {
    let secs = match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .context(format!("failed to parse {name}: invalid format"))?,
        Err(_) => default_secs,
    };

    Ok(Duration::from_secs(secs))
}
