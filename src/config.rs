use std::time::Duration;

use anyhow::{anyhow, Result};

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote asset registry.
    pub registry_url: String,
    /// Port the HTTP surface listens on.
    pub port: u16,
    /// Delay before the first sweep tick.
    pub sweep_initial_delay: Duration,
    /// Fixed period between sweep tick starts.
    pub sweep_period: Duration,
    /// Raw tenant directory, `id:username:password` comma-separated.
    pub tenant_spec: String,
}

impl Config {
    /// Creates the configuration from environment variables, loading a
    /// `.env` file when present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let registry_url = std::env::var("TEMPSIM_REGISTRY_URL")
            .map_err(|_| anyhow!("TEMPSIM_REGISTRY_URL environment variable is required"))?;

        let tenant_spec = std::env::var("TEMPSIM_TENANTS")
            .map_err(|_| anyhow!("TEMPSIM_TENANTS environment variable is required"))?;

        let port = std::env::var("TEMPSIM_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let sweep_initial_delay = duration_var("TEMPSIM_SWEEP_INITIAL_DELAY_SECS", 10)?;
        let sweep_period = duration_var("TEMPSIM_SWEEP_PERIOD_SECS", 5)?;

        Ok(Self {
            registry_url,
            port,
            sweep_initial_delay,
            sweep_period,
            tenant_spec,
        })
    }
}

fn duration_var(name: &str, default_secs: u64) -> Result<Duration> {
    let secs = match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|_| anyhow!("{} must be a whole number of seconds", name))?,
        Err(_) => default_secs,
    };
    Ok(Duration::from_secs(secs))
}
