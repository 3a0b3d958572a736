use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::registry::RegistryError;
use crate::reporter::MeasurementReporter;
use crate::resolver::DeviceResolver;
use crate::tenants::{Subscriptions, Tenant};

/// Background driver: on every tick, resolve and report once for each
/// active tenant. Tenants are independent, so one tenant's failure is
/// logged and the tick carries on with the rest.
pub struct TenantSweep {
    subscriptions: Arc<dyn Subscriptions>,
    resolver: DeviceResolver,
    reporter: MeasurementReporter,
    initial_delay: Duration,
    period: Duration,
}

impl TenantSweep {
    pub fn new(
        subscriptions: Arc<dyn Subscriptions>,
        resolver: DeviceResolver,
        reporter: MeasurementReporter,
        initial_delay: Duration,
        period: Duration,
    ) -> Self {
        Self {
            subscriptions,
            resolver,
            reporter,
            initial_delay,
            period,
        }
    }

    /// Runs forever; intended for `tokio::spawn`. Ticks fire on a
    /// fixed period between starts; a tick that overruns delays the
    /// next one rather than overlapping it, and ticks missed entirely
    /// are skipped.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.initial_delay, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// One full pass over the active tenants. Failures stay inside the
    /// per-tenant boundary; the next tick is the retry.
    pub async fn sweep_once(&self) {
        let tenants = self.subscriptions.active_tenants();
        debug!(count = tenants.len(), "sweeping active tenants");

        for tenant in tenants {
            if let Err(e) = self.process_tenant(&tenant).await {
                warn!(tenant = %tenant.id, error = %e, "tenant sweep failed");
            }
        }
    }

    async fn process_tenant(&self, tenant: &Tenant) -> Result<(), RegistryError> {
        let device = self.resolver.resolve(tenant).await?;
        self.reporter.report(tenant, &device).await
    }
}
