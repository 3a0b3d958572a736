use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tempsim_rs::api::{self, ApiState};
use tempsim_rs::config::Config;
use tempsim_rs::query::LatestReading;
use tempsim_rs::registry::{HttpRegistryClient, RegistryApi};
use tempsim_rs::reporter::MeasurementReporter;
use tempsim_rs::resolver::DeviceResolver;
use tempsim_rs::sweep::TenantSweep;
use tempsim_rs::tenants::EnvSubscriptions;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(
            EnvFilter::default().add_directive("info".parse()?),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(registry = %config.registry_url, "configuration loaded");

    let registry: Arc<dyn RegistryApi> = Arc::new(HttpRegistryClient::new(&config.registry_url)?);
    let subscriptions = Arc::new(EnvSubscriptions::from_spec(&config.tenant_spec)?);

    let resolver = DeviceResolver::new(registry.clone());
    let reporter = MeasurementReporter::new(registry.clone());
    let latest = LatestReading::new(registry.clone(), resolver.clone());

    let sweep = TenantSweep::new(
        subscriptions.clone(),
        resolver,
        reporter,
        config.sweep_initial_delay,
        config.sweep_period,
    );
    info!(
        initial_delay_secs = config.sweep_initial_delay.as_secs(),
        period_secs = config.sweep_period.as_secs(),
        "starting tenant sweep"
    );
    tokio::spawn(sweep.run());

    let state = ApiState::new(subscriptions, latest);
    api::serve(state, config.port).await
}
