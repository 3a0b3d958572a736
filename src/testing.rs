//! In-memory stand-ins for the registry boundary, used by the unit
//! tests in place of the HTTP client.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{DeviceId, ManagedObject, Measurement, MeasurementFilter};
use crate::registry::{RegistryApi, RegistryError};
use crate::tenants::Tenant;

#[derive(Default)]
struct RegistryState {
    /// (tenant, scheme, value) -> bound device
    bindings: HashMap<(String, String, String), DeviceId>,
    /// tenant -> created managed objects, insertion order
    objects: HashMap<String, Vec<ManagedObject>>,
    /// tenant -> stored measurements, insertion order
    measurements: HashMap<String, Vec<Measurement>>,
    failing: HashSet<String>,
    lookup_calls: usize,
    create_calls: usize,
    bind_calls: usize,
    last_query: Option<(bool, u32)>,
    next_id: u64,
}

/// Registry fake that serves stored state and records call counts, so
/// tests can assert both results and write side effects.
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation for the tenant fail with a
    /// registry status error.
    pub fn fail_tenant(&self, tenant_id: &str) {
        self.state.lock().unwrap().failing.insert(tenant_id.to_string());
    }

    /// Lifts a failure injected with `fail_tenant`.
    pub fn recover_tenant(&self, tenant_id: &str) {
        self.state.lock().unwrap().failing.remove(tenant_id);
    }

    /// Seeds a stored measurement without going through the reporter.
    pub fn push_measurement(&self, tenant_id: &str, measurement: Measurement) {
        self.state
            .lock()
            .unwrap()
            .measurements
            .entry(tenant_id.to_string())
            .or_default()
            .push(measurement);
    }

    pub fn lookup_calls(&self) -> usize {
        self.state.lock().unwrap().lookup_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn bind_calls(&self) -> usize {
        self.state.lock().unwrap().bind_calls
    }

    /// The (reverse, page_size) modifiers of the most recent query.
    pub fn last_query(&self) -> Option<(bool, u32)> {
        self.state.lock().unwrap().last_query
    }

    pub fn objects_for(&self, tenant_id: &str) -> Vec<ManagedObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn measurements_for(&self, tenant_id: &str) -> Vec<Measurement> {
        self.state
            .lock()
            .unwrap()
            .measurements
            .get(tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn bound_device(&self, tenant_id: &str, scheme: &str, value: &str) -> Option<DeviceId> {
        self.state
            .lock()
            .unwrap()
            .bindings
            .get(&(tenant_id.to_string(), scheme.to_string(), value.to_string()))
            .cloned()
    }

    fn check_failing(state: &RegistryState, tenant: &Tenant) -> Result<(), RegistryError> {
        if state.failing.contains(&tenant.id) {
            return Err(RegistryError::Status {
                status: 503,
                body: "injected registry failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryApi for InMemoryRegistry {
    async fn lookup_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
    ) -> Result<Option<DeviceId>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_failing(&state, tenant)?;
        state.lookup_calls += 1;

        let key = (tenant.id.clone(), scheme.to_string(), value.to_string());
        Ok(state.bindings.get(&key).cloned())
    }

    async fn create_managed_object(
        &self,
        tenant: &Tenant,
        object: &ManagedObject,
    ) -> Result<DeviceId, RegistryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_failing(&state, tenant)?;
        state.create_calls += 1;
        state.next_id += 1;

        let id = DeviceId::new(format!("mo-{}", state.next_id));
        let mut created = object.clone();
        created.id = Some(id.clone());
        state
            .objects
            .entry(tenant.id.clone())
            .or_default()
            .push(created);

        Ok(id)
    }

    async fn bind_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
        device: &DeviceId,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_failing(&state, tenant)?;
        state.bind_calls += 1;

        let key = (tenant.id.clone(), scheme.to_string(), value.to_string());
        state.bindings.insert(key, device.clone());
        Ok(())
    }

    async fn create_measurement(
        &self,
        tenant: &Tenant,
        measurement: &Measurement,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_failing(&state, tenant)?;

        state
            .measurements
            .entry(tenant.id.clone())
            .or_default()
            .push(measurement.clone());
        Ok(())
    }

    async fn query_measurements(
        &self,
        tenant: &Tenant,
        filter: &MeasurementFilter,
        reverse: bool,
        page_size: u32,
    ) -> Result<Vec<Measurement>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        Self::check_failing(&state, tenant)?;
        state.last_query = Some((reverse, page_size));

        let stored = state
            .measurements
            .get(&tenant.id)
            .cloned()
            .unwrap_or_default();

        let matches = |m: &Measurement| {
            m.source.id == filter.source
                && m.measurement_type == filter.measurement_type
                && m.time >= filter.date_from
                && m.time <= filter.date_to
        };

        // The real registry yields insertion order, reversed when the
        // revert modifier is present.
        let page: Vec<Measurement> = if reverse {
            stored.into_iter().rev().filter(matches).take(page_size as usize).collect()
        } else {
            stored.into_iter().filter(matches).take(page_size as usize).collect()
        };

        Ok(page)
    }
}
