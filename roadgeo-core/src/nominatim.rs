//! Nominatim / OpenStreetMap geocoder client.
//!
//! The public instance allows at most one request per second, so the client
//! keeps a fixed minimum spacing between requests (see
//! [`NominatimConfig::min_interval`]). It does not retry or back off.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/> and
//! <https://nominatim.org/release-docs/develop/api/Reverse/>

use crate::geocoding::{Address, Coordinates, GeocodeError, Geocoder};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Connection settings for a Nominatim instance
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Base URL without the endpoint path
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum spacing between two requests
    pub min_interval: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("roadgeo/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Blocking Nominatim client
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    config: NominatimConfig,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Sleep until `min_interval` has passed since the previous request
    fn throttle(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let delay = throttle_delay(*last, Instant::now(), self.config.min_interval);
        if !delay.is_zero() {
            log::debug!("Waiting {:?} before next Nominatim request", delay);
            std::thread::sleep(delay);
        }
        *last = Some(Instant::now());
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, GeocodeError> {
        self.throttle();

        let response = self.client.get(self.endpoint(path)).query(query).send()?;

        check_status(response.status())?;

        Ok(response.json()?)
    }
}

impl Geocoder for NominatimGeocoder {
    fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        log::debug!("Geocoding '{}' via Nominatim", query);
        let body = self.get_json(
            "search",
            &[
                ("q", query.to_string()),
                ("format", "jsonv2".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        parse_search_response(&body)
    }

    fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError> {
        log::debug!("Reverse geocoding {} via Nominatim", coordinates);
        let body = self.get_json(
            "reverse",
            &[
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
                ("format", "jsonv2".to_string()),
                ("addressdetails", "1".to_string()),
            ],
        )?;
        parse_reverse_response(&body)
    }
}

/// 429 is reported separately so callers can tell throttling from other failures
fn check_status(status: reqwest::StatusCode) -> Result<(), GeocodeError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }
    if !status.is_success() {
        return Err(GeocodeError::Status(status));
    }
    Ok(())
}

fn throttle_delay(last: Option<Instant>, now: Instant, min_interval: Duration) -> Duration {
    match last {
        Some(last) => min_interval.saturating_sub(now.saturating_duration_since(last)),
        None => Duration::ZERO,
    }
}

/// Parses a `/search` response: an array of places, best match first
fn parse_search_response(body: &serde_json::Value) -> Result<Option<Coordinates>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim search response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = parse_degrees(&first["lat"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lat in Nominatim response".to_string(),
    })?;
    let longitude = parse_degrees(&first["lon"]).ok_or_else(|| GeocodeError::Parse {
        message: "Missing lon in Nominatim response".to_string(),
    })?;

    Ok(Some(Coordinates::new(latitude, longitude)))
}

/// Parses a `/reverse` response: a single place object, or `{"error": ...}` when
/// nothing is there
fn parse_reverse_response(body: &serde_json::Value) -> Result<Option<Address>, GeocodeError> {
    let object = body.as_object().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim reverse response is not an object".to_string(),
    })?;

    if let Some(error) = object.get("error") {
        log::debug!("Nominatim reverse returned no result: {}", error);
        return Ok(None);
    }

    match object.get("address") {
        Some(address) => serde_json::from_value(address.clone())
            .map(Some)
            .map_err(|e| GeocodeError::Parse {
                message: format!("Invalid address in Nominatim response: {}", e),
            }),
        None => Ok(Some(Address::default())),
    }
}

// Nominatim returns coordinates as strings
fn parse_degrees(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
