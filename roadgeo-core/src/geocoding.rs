//! Geocoder abstraction shared by both pipelines.
//!
//! A [`Geocoder`] answers two questions: where is this place
//! ([`Geocoder::forward`]) and what is at this point ([`Geocoder::reverse`]).
//! `Ok(None)` means the service replied but had no match; transport and
//! protocol problems are reported as [`GeocodeError`].

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Road-name placeholder for addresses without a `road` field
pub const UNKNOWN_ROAD: &str = "Unknown";

/// WGS84 latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Written in place of a failed forward lookup
    pub const SENTINEL: Coordinates = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Address fields returned by a reverse lookup
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    pub road: Option<String>,
    pub neighbourhood: Option<String>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

impl Address {
    /// The road name, or [`UNKNOWN_ROAD`] when the service didn't return one
    pub fn road_or_unknown(&self) -> &str {
        self.road
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(UNKNOWN_ROAD)
    }
}

/// Errors from geocoding operations
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (connection, timeout, TLS, body decoding)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Geocoding API returned status: {0}")]
    Status(reqwest::StatusCode),

    /// Service asked us to slow down (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Response didn't have the expected shape
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Service had no result for the query
    #[error("No result for {0}")]
    NotFound(String),
}

/// A forward + reverse geocoding service.
///
/// Calls are blocking; implementations are used from a single worker.
pub trait Geocoder {
    /// Resolve a free-form query to coordinates
    fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;

    /// Resolve coordinates to an address
    fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        (**self).forward(query)
    }

    fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError> {
        (**self).reverse(coordinates)
    }
}

impl<G: Geocoder + ?Sized> Geocoder for Box<G> {
    fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        (**self).forward(query)
    }

    fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError> {
        (**self).reverse(coordinates)
    }
}

/// Scripted in-memory geocoder for pipeline tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeGeocoder {
        places: HashMap<String, Coordinates>,
        roads: Vec<(Coordinates, Address)>,
        failing: HashSet<String>,
        pub forward_calls: Mutex<Vec<String>>,
        pub reverse_calls: Mutex<Vec<Coordinates>>,
    }

    impl FakeGeocoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_place(mut self, query: &str, lat: f64, lon: f64) -> Self {
            self.places.insert(query.to_string(), Coordinates::new(lat, lon));
            self
        }

        /// Forward lookups for `query` return a transport-style error
        pub fn failing_on(mut self, query: &str) -> Self {
            self.failing.insert(query.to_string());
            self
        }

        pub fn with_address(mut self, lat: f64, lon: f64, address: Address) -> Self {
            self.roads.push((Coordinates::new(lat, lon), address));
            self
        }

        pub fn with_road(self, lat: f64, lon: f64, road: &str) -> Self {
            self.with_address(
                lat,
                lon,
                Address {
                    road: Some(road.to_string()),
                    ..Address::default()
                },
            )
        }

        pub fn forward_count(&self) -> usize {
            self.forward_calls.lock().unwrap().len()
        }

        pub fn reverse_count(&self) -> usize {
            self.reverse_calls.lock().unwrap().len()
        }
    }

    impl Geocoder for FakeGeocoder {
        fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            self.forward_calls.lock().unwrap().push(query.to_string());
            if self.failing.contains(query) {
                return Err(GeocodeError::RateLimited);
            }
            Ok(self.places.get(query).copied())
        }

        fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError> {
            self.reverse_calls.lock().unwrap().push(coordinates);
            Ok(self
                .roads
                .iter()
                .find(|(c, _)| *c == coordinates)
                .map(|(_, a)| a.clone()))
        }
    }
}
