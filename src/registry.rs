use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::{DeviceId, ExternalId, ManagedObject, Measurement, MeasurementFilter};
use crate::tenants::Tenant;

// ===== ERRORS =====

/// Failures surfaced by the registry boundary. An absent binding or an
/// empty query page is not an error; those are expressed as `None` and
/// an empty page by the respective operations, so callers never branch
/// on an error to detect "not found".
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection, timeout or body-read failure before a status code
    /// was obtained.
    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry replied with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The registry answered 2xx but the payload was not usable.
    #[error("unexpected registry response: {0}")]
    InvalidResponse(String),
}

// ===== CAPABILITY SURFACE =====

/// Operations this service consumes from the remote asset registry.
/// Every call is scoped to one tenant's namespace and authenticated
/// with that tenant's credentials.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Looks up the managed object bound to an external identifier.
    /// Returns `Ok(None)` exactly when the registry has no binding for
    /// the pair; every other failure propagates as an error.
    async fn lookup_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
    ) -> Result<Option<DeviceId>, RegistryError>;

    /// Creates a managed object and returns the registry-assigned id.
    async fn create_managed_object(
        &self,
        tenant: &Tenant,
        object: &ManagedObject,
    ) -> Result<DeviceId, RegistryError>;

    /// Binds an external identifier to an existing managed object.
    async fn bind_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
        device: &DeviceId,
    ) -> Result<(), RegistryError>;

    /// Appends one measurement to the registry.
    async fn create_measurement(
        &self,
        tenant: &Tenant,
        measurement: &Measurement,
    ) -> Result<(), RegistryError>;

    /// Returns measurements matching the filter. The registry applies
    /// no explicit ordering; with `reverse` set it yields reverse
    /// insertion order, which is an implicit contract of the remote
    /// collaborator rather than a documented sort capability.
    async fn query_measurements(
        &self,
        tenant: &Tenant,
        filter: &MeasurementFilter,
        reverse: bool,
        page_size: u32,
    ) -> Result<Vec<Measurement>, RegistryError>;
}

// ===== HTTP CLIENT =====

/// Page envelope returned by the measurement query endpoint.
#[derive(Debug, Deserialize)]
struct MeasurementPage {
    measurements: Vec<Measurement>,
}

/// Production registry client speaking the inventory's REST API over
/// HTTP with per-tenant basic auth. One shared connection pool serves
/// all tenants; isolation happens per request through credentials.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    /// Creates a client for the registry at `base_url`. The URL is
    /// validated at construction.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)?;

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Converts a non-success response into a `Status` error carrying
    /// whatever body the registry sent along.
    async fn status_error(response: Response) -> RegistryError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RegistryError::Status { status, body }
    }
}

#[async_trait]
impl RegistryApi for HttpRegistryClient {
    async fn lookup_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
    ) -> Result<Option<DeviceId>, RegistryError> {
        let url = self.endpoint(&format!("identity/externalIds/{}/{}", scheme, value));
        debug!(tenant = %tenant.id, %url, "looking up external id");

        let response = self
            .http
            .get(&url)
            .basic_auth(&tenant.username, Some(&tenant.password))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let binding: ExternalId = response.json().await?;
        let source = binding.managed_object.ok_or_else(|| {
            RegistryError::InvalidResponse("external id binding without managed object".to_string())
        })?;

        Ok(Some(source.id))
    }

    async fn create_managed_object(
        &self,
        tenant: &Tenant,
        object: &ManagedObject,
    ) -> Result<DeviceId, RegistryError> {
        let url = self.endpoint("inventory/managedObjects");
        debug!(tenant = %tenant.id, name = %object.name, "creating managed object");

        let response = self
            .http
            .post(&url)
            .basic_auth(&tenant.username, Some(&tenant.password))
            .json(object)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let created: ManagedObject = response.json().await?;
        created.id.ok_or_else(|| {
            RegistryError::InvalidResponse("created managed object carries no id".to_string())
        })
    }

    async fn bind_external_id(
        &self,
        tenant: &Tenant,
        scheme: &str,
        value: &str,
        device: &DeviceId,
    ) -> Result<(), RegistryError> {
        let url = self.endpoint(&format!("identity/globalIds/{}/externalIds", device));
        debug!(tenant = %tenant.id, %device, "binding external id");

        let response = self
            .http
            .post(&url)
            .basic_auth(&tenant.username, Some(&tenant.password))
            .json(&ExternalId::new(scheme, value))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(())
    }

    async fn create_measurement(
        &self,
        tenant: &Tenant,
        measurement: &Measurement,
    ) -> Result<(), RegistryError> {
        let url = self.endpoint("measurement/measurements");

        let response = self
            .http
            .post(&url)
            .basic_auth(&tenant.username, Some(&tenant.password))
            .json(measurement)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(())
    }

    async fn query_measurements(
        &self,
        tenant: &Tenant,
        filter: &MeasurementFilter,
        reverse: bool,
        page_size: u32,
    ) -> Result<Vec<Measurement>, RegistryError> {
        let url = self.endpoint("measurement/measurements");

        let mut query = vec![
            ("type".to_string(), filter.measurement_type.clone()),
            ("dateFrom".to_string(), filter.date_from.to_rfc3339()),
            ("dateTo".to_string(), filter.date_to.to_rfc3339()),
            (
                "valueFragmentType".to_string(),
                filter.value_fragment_type.clone(),
            ),
            (
                "valueFragmentSeries".to_string(),
                filter.value_fragment_series.clone(),
            ),
            ("source".to_string(), filter.source.to_string()),
            ("pageSize".to_string(), page_size.to_string()),
        ];
        if reverse {
            query.push(("revert".to_string(), "true".to_string()));
        }

        let response = self
            .http
            .get(&url)
            .basic_auth(&tenant.username, Some(&tenant.password))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let page: MeasurementPage = response.json().await?;
        Ok(page.measurements)
    }
}
