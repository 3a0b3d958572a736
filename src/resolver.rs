use std::sync::Arc;

use tracing::info;

use crate::models::{
    DeviceId, ManagedObject, DEVICE_NAME, DEVICE_TYPE, EXTERNAL_ID_TYPE, EXTERNAL_ID_VALUE,
};
use crate::registry::{RegistryApi, RegistryError};
use crate::tenants::Tenant;

/// Find-or-create resolution of the single simulated device per
/// tenant, keyed by the fixed external identifier.
#[derive(Clone)]
pub struct DeviceResolver {
    registry: Arc<dyn RegistryApi>,
}

impl DeviceResolver {
    pub fn new(registry: Arc<dyn RegistryApi>) -> Self {
        Self { registry }
    }

    /// Returns the tenant's device id, creating and binding the device
    /// on first use. Once the binding exists this is a pure read.
    ///
    /// Transport and registry errors from the probe propagate; only a
    /// genuinely absent binding takes the creation path.
    ///
    /// Known race: the sweep task and an HTTP request may both probe
    /// before any binding exists and each create a device. Whether one
    /// of the two bind calls is rejected depends on the registry
    /// enforcing binding-value uniqueness; this service does not add
    /// its own lock on top.
    pub async fn resolve(&self, tenant: &Tenant) -> Result<DeviceId, RegistryError> {
        let probed = self
            .registry
            .lookup_external_id(tenant, EXTERNAL_ID_TYPE, EXTERNAL_ID_VALUE)
            .await?;

        if let Some(id) = probed {
            return Ok(id);
        }

        // First use for this tenant: create the device, then bind the
        // serial to it.
        let object = ManagedObject::device(DEVICE_NAME, DEVICE_TYPE);
        let id = self.registry.create_managed_object(tenant, &object).await?;
        self.registry
            .bind_external_id(tenant, EXTERNAL_ID_TYPE, EXTERNAL_ID_VALUE, &id)
            .await?;

        info!(tenant = %tenant.id, device = %id, "registered simulated device");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRegistry;

    fn acme() -> Tenant {
        Tenant::new("acme", "svc-user", "secret")
    }

    #[tokio::test]
    async fn test_first_resolve_creates_and_binds_device() {
        let registry = Arc::new(InMemoryRegistry::new());
        let resolver = DeviceResolver::new(registry.clone());

        let id = resolver.resolve(&acme()).await.unwrap();

        assert_eq!(registry.create_calls(), 1);
        assert_eq!(registry.bind_calls(), 1);
        assert_eq!(
            registry.bound_device("acme", EXTERNAL_ID_TYPE, EXTERNAL_ID_VALUE),
            Some(id)
        );

        let objects = registry.objects_for("acme");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, DEVICE_NAME);
        assert_eq!(objects[0].object_type, DEVICE_TYPE);
        assert!(objects[0].is_device.is_some());
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_pure_read() {
        let registry = Arc::new(InMemoryRegistry::new());
        let resolver = DeviceResolver::new(registry.clone());

        let first = resolver.resolve(&acme()).await.unwrap();
        let second = resolver.resolve(&acme()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.create_calls(), 1);
        assert_eq!(registry.bind_calls(), 1);
        assert_eq!(registry.lookup_calls(), 2);
    }

    #[tokio::test]
    async fn test_tenants_resolve_independent_devices() {
        let registry = Arc::new(InMemoryRegistry::new());
        let resolver = DeviceResolver::new(registry.clone());

        let acme_device = resolver.resolve(&acme()).await.unwrap();
        let globex_device = resolver
            .resolve(&Tenant::new("globex", "bot", "pw"))
            .await
            .unwrap();

        assert_ne!(acme_device, globex_device);
        assert_eq!(registry.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_registry_failure_propagates_without_creation() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.fail_tenant("acme");
        let resolver = DeviceResolver::new(registry.clone());

        let result = resolver.resolve(&acme()).await;

        assert!(matches!(
            result,
            Err(RegistryError::Status { status: 503, .. })
        ));
        assert_eq!(registry.create_calls(), 0);
        assert_eq!(registry.bind_calls(), 0);
    }
}
