use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::models::{DeviceId, Measurement};
use crate::registry::{RegistryApi, RegistryError};
use crate::tenants::Tenant;

/// Samples one synthetic temperature magnitude, whole degrees in
/// [0, 100).
fn sample_temperature() -> i64 {
    rand::random_range(0..100)
}

/// Submits one synthetic temperature reading per call against a
/// resolved device. No retries; a failed submission ends the tenant's
/// work for this tick and the next tick reports independently.
#[derive(Clone)]
pub struct MeasurementReporter {
    registry: Arc<dyn RegistryApi>,
}

impl MeasurementReporter {
    pub fn new(registry: Arc<dyn RegistryApi>) -> Self {
        Self { registry }
    }

    pub async fn report(&self, tenant: &Tenant, device: &DeviceId) -> Result<(), RegistryError> {
        let value = sample_temperature();
        let measurement = Measurement::temperature(device, Utc::now(), value);

        debug!(tenant = %tenant.id, %device, value, "reporting temperature");
        self.registry.create_measurement(tenant, &measurement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FRAGMENT_TYPE, MEASUREMENT_TYPE, SERIES_NAME, TEMPERATURE_UNIT};
    use crate::testing::InMemoryRegistry;

    fn acme() -> Tenant {
        Tenant::new("acme", "svc-user", "secret")
    }

    #[test]
    fn test_sampled_magnitudes_stay_in_range() {
        for _ in 0..1000 {
            let value = sample_temperature();
            assert!((0..100).contains(&value));
        }
    }

    #[tokio::test]
    async fn test_report_appends_one_measurement() {
        let registry = Arc::new(InMemoryRegistry::new());
        let reporter = MeasurementReporter::new(registry.clone());
        let device = DeviceId::new("mo-1");

        reporter.report(&acme(), &device).await.unwrap();

        let stored = registry.measurements_for("acme");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source.id, device);
        assert_eq!(stored[0].measurement_type, MEASUREMENT_TYPE);
        assert_eq!(stored[0].temperature.outside.unit, TEMPERATURE_UNIT);
        assert!((0..100).contains(&stored[0].temperature.outside.value));
    }

    #[tokio::test]
    async fn test_report_failure_propagates() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.fail_tenant("acme");
        let reporter = MeasurementReporter::new(registry.clone());

        let result = reporter.report(&acme(), &DeviceId::new("mo-1")).await;

        assert!(result.is_err());
        assert!(registry.measurements_for("acme").is_empty());
    }

    #[test]
    fn test_fragment_identity_is_fixed() {
        // The fragment and series names the reporter writes are the
        // same literals the latest-reading filter queries by.
        let measurement = Measurement::temperature(&DeviceId::new("mo-1"), Utc::now(), 1);
        let json = serde_json::to_value(&measurement).unwrap();
        assert!(json.get(FRAGMENT_TYPE).is_some());
        assert!(json[FRAGMENT_TYPE].get(SERIES_NAME).is_some());
    }
}
