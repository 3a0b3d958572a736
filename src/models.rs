use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ===== PROTOCOL CONSTANTS =====

/// Display name given to the simulated device in the inventory.
pub const DEVICE_NAME: &str = "Microservice-Part6";
/// Type tag of the simulated device in the inventory.
pub const DEVICE_TYPE: &str = "Microservice-Part6";
/// External-identifier scheme the device is registered under.
pub const EXTERNAL_ID_TYPE: &str = "c8y_Serial";
/// Fixed external-identifier value. Acts as the find-or-create
/// idempotency key, one device per tenant namespace; not parameterized
/// per device instance.
pub const EXTERNAL_ID_VALUE: &str = "Microservice-Part6_externalId";
/// Type tag of the reported measurements.
pub const MEASUREMENT_TYPE: &str = "c8y_CustomTemperatureMeasurement";
/// Fragment name carrying the temperature value.
pub const FRAGMENT_TYPE: &str = "c8y_example_CustomTemperatureMeasurement";
/// Series name inside the temperature fragment.
pub const SERIES_NAME: &str = "temperatureOutside";
/// Unit attached to reported temperatures.
pub const TEMPERATURE_UNIT: &str = "C";

// ===== IDENTIFIERS =====

/// Opaque inventory identifier assigned by the registry on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== INVENTORY REPRESENTATIONS =====

/// Reference to a managed object, as embedded in other representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: DeviceId,
}

impl Source {
    pub fn new(id: &DeviceId) -> Self {
        Self { id: id.clone() }
    }
}

/// Marker fragment that classifies a managed object as a device.
/// Serializes to an empty JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMarker {}

/// Managed object representation, both as sent on creation (no id)
/// and as returned by the registry (id assigned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeviceId>,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(rename = "c8y_IsDevice", skip_serializing_if = "Option::is_none")]
    pub is_device: Option<DeviceMarker>,
}

impl ManagedObject {
    /// Creation payload for the simulated device with the constant
    /// name, type and device marker.
    pub fn device(name: &str, object_type: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            object_type: object_type.to_string(),
            is_device: Some(DeviceMarker::default()),
        }
    }
}

/// External-identifier binding, mapping a (scheme, value) pair to a
/// managed object within one tenant's registry namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalId {
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(rename = "type")]
    pub id_type: String,
    #[serde(rename = "managedObject", skip_serializing_if = "Option::is_none")]
    pub managed_object: Option<Source>,
}

impl ExternalId {
    /// Binding payload for an existing managed object. The registry
    /// derives the bound object from the request path, so the payload
    /// only carries the pair itself.
    pub fn new(id_type: &str, external_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            id_type: id_type.to_string(),
            managed_object: None,
        }
    }
}

// ===== MEASUREMENTS =====

/// Value of one series inside a measurement fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesValue {
    pub value: i64,
    pub unit: String,
}

/// The temperature fragment reported by this service; the series name
/// is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureFragment {
    #[serde(rename = "temperatureOutside")]
    pub outside: SeriesValue,
}

/// One sensor reading, append-only once created. The timestamp is the
/// generation time at the caller, not the registry's ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub source: Source,
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub measurement_type: String,
    #[serde(rename = "c8y_example_CustomTemperatureMeasurement")]
    pub temperature: TemperatureFragment,
}

impl Measurement {
    /// Builds a temperature measurement against the given device with
    /// the fixed type, fragment and series identity.
    pub fn temperature(device: &DeviceId, time: DateTime<Utc>, value: i64) -> Self {
        Self {
            source: Source::new(device),
            time,
            measurement_type: MEASUREMENT_TYPE.to_string(),
            temperature: TemperatureFragment {
                outside: SeriesValue {
                    value,
                    unit: TEMPERATURE_UNIT.to_string(),
                },
            },
        }
    }
}

/// Filter criteria accepted by the registry's measurement query. The
/// query API filters but does not sort; ordering is requested
/// separately through the reverse modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementFilter {
    pub measurement_type: String,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub value_fragment_type: String,
    pub value_fragment_series: String,
    pub source: DeviceId,
}

impl MeasurementFilter {
    /// Filter matching every temperature reading ever reported against
    /// the given device: fixed type and fragment/series identity over
    /// the full time window (epoch to now).
    pub fn temperature_history(device: &DeviceId) -> Self {
        Self {
            measurement_type: MEASUREMENT_TYPE.to_string(),
            date_from: DateTime::<Utc>::UNIX_EPOCH,
            date_to: Utc::now(),
            value_fragment_type: FRAGMENT_TYPE.to_string(),
            value_fragment_series: SERIES_NAME.to_string(),
            source: device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_wire_format() {
        let device = DeviceId::new("4711");
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let measurement = Measurement::temperature(&device, time, 42);

        let json = serde_json::to_value(&measurement).unwrap();
        assert_eq!(json["source"]["id"], "4711");
        assert_eq!(json["type"], MEASUREMENT_TYPE);
        assert_eq!(
            json["c8y_example_CustomTemperatureMeasurement"]["temperatureOutside"]["value"],
            42
        );
        assert_eq!(
            json["c8y_example_CustomTemperatureMeasurement"]["temperatureOutside"]["unit"],
            "C"
        );
    }

    #[test]
    fn test_managed_object_creation_payload_has_device_marker() {
        let object = ManagedObject::device(DEVICE_NAME, DEVICE_TYPE);

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["name"], DEVICE_NAME);
        assert_eq!(json["type"], DEVICE_TYPE);
        assert_eq!(json["c8y_IsDevice"], serde_json::json!({}));
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_external_id_lookup_response_parses() {
        let body = serde_json::json!({
            "externalId": EXTERNAL_ID_VALUE,
            "type": EXTERNAL_ID_TYPE,
            "managedObject": { "id": "815" }
        });

        let binding: ExternalId = serde_json::from_value(body).unwrap();
        assert_eq!(binding.external_id, EXTERNAL_ID_VALUE);
        assert_eq!(binding.managed_object.unwrap().id, DeviceId::new("815"));
    }

    #[test]
    fn test_temperature_history_filter_covers_full_window() {
        let device = DeviceId::new("4711");
        let filter = MeasurementFilter::temperature_history(&device);

        assert_eq!(filter.date_from, DateTime::<Utc>::UNIX_EPOCH);
        assert!(filter.date_to > filter.date_from);
        assert_eq!(filter.source, device);
        assert_eq!(filter.value_fragment_series, SERIES_NAME);
    }
}
