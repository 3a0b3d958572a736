use std::sync::Arc;

use crate::models::{DeviceId, Measurement, MeasurementFilter};
use crate::registry::{RegistryApi, RegistryError};
use crate::resolver::DeviceResolver;
use crate::tenants::Tenant;

/// Read path for the most recent temperature reading of a tenant's
/// device.
#[derive(Clone)]
pub struct LatestReading {
    registry: Arc<dyn RegistryApi>,
    resolver: DeviceResolver,
}

impl LatestReading {
    pub fn new(registry: Arc<dyn RegistryApi>, resolver: DeviceResolver) -> Self {
        Self { registry, resolver }
    }

    /// Resolves the tenant's device and returns its most recent
    /// reading, or `None` when nothing has been reported yet.
    /// Transport and registry failures propagate and are never
    /// collapsed into `None`.
    pub async fn latest(&self, tenant: &Tenant) -> Result<Option<Measurement>, RegistryError> {
        let device = self.resolver.resolve(tenant).await?;
        self.fetch_most_recent(tenant, &device).await
    }

    /// The registry's query API filters but cannot sort, so "most
    /// recent" is obtained by requesting reverse insertion order with a
    /// page size of one. That ordering is an implicit contract with the
    /// registry; if it ever grows a real server-side sort, this is the
    /// one place to swap it in.
    async fn fetch_most_recent(
        &self,
        tenant: &Tenant,
        device: &DeviceId,
    ) -> Result<Option<Measurement>, RegistryError> {
        let filter = MeasurementFilter::temperature_history(device);
        let page = self
            .registry
            .query_measurements(tenant, &filter, true, 1)
            .await?;

        Ok(page.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRegistry;
    use chrono::{Duration, Utc};

    fn acme() -> Tenant {
        Tenant::new("acme", "svc-user", "secret")
    }

    /// Registry with the acme binding already in place, so `latest`
    /// exercises the read-mostly path.
    async fn resolved_setup() -> (Arc<InMemoryRegistry>, LatestReading, DeviceId) {
        let registry = Arc::new(InMemoryRegistry::new());
        let resolver = DeviceResolver::new(registry.clone());
        let device = resolver.resolve(&acme()).await.unwrap();
        let latest = LatestReading::new(registry.clone(), resolver);
        (registry, latest, device)
    }

    #[tokio::test]
    async fn test_latest_is_none_without_measurements() {
        let (_, latest, _) = resolved_setup().await;

        let result = latest.latest(&acme()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_latest_returns_max_timestamp_measurement() {
        let (registry, latest, device) = resolved_setup().await;

        let base = Utc::now() - Duration::minutes(10);
        for (offset, value) in [(0, 11), (1, 22), (2, 33)] {
            registry.push_measurement(
                "acme",
                Measurement::temperature(&device, base + Duration::minutes(offset), value),
            );
        }

        let newest = latest.latest(&acme()).await.unwrap().unwrap();
        assert_eq!(newest.temperature.outside.value, 33);
        assert_eq!(newest.time, base + Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_latest_after_three_reports_is_the_third() {
        let (registry, latest, device) = resolved_setup().await;
        let reporter = crate::reporter::MeasurementReporter::new(registry.clone());

        for _ in 0..3 {
            reporter.report(&acme(), &device).await.unwrap();
        }

        let stored = registry.measurements_for("acme");
        assert_eq!(stored.len(), 3);

        let newest = latest.latest(&acme()).await.unwrap().unwrap();
        assert_eq!(newest, stored[2]);
        assert!(stored.iter().all(|m| m.time <= newest.time));
    }

    #[tokio::test]
    async fn test_fetch_uses_reversed_single_entry_page() {
        let (registry, latest, device) = resolved_setup().await;
        registry.push_measurement("acme", Measurement::temperature(&device, Utc::now(), 5));

        latest.latest(&acme()).await.unwrap();

        assert_eq!(registry.last_query(), Some((true, 1)));
    }

    #[tokio::test]
    async fn test_latest_ignores_other_devices_measurements() {
        let (registry, latest, _) = resolved_setup().await;

        let stranger = DeviceId::new("mo-999");
        registry.push_measurement("acme", Measurement::temperature(&stranger, Utc::now(), 77));

        let result = latest.latest(&acme()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_registry_failure_is_not_collapsed_to_none() {
        let (registry, latest, _) = resolved_setup().await;
        registry.fail_tenant("acme");

        assert!(latest.latest(&acme()).await.is_err());
    }
}
