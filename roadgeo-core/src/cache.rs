use crate::geocoding::{Address, Coordinates, GeocodeError, Geocoder};
use std::collections::HashMap;
use std::sync::Mutex;

/// Memoizes lookups so that a road repeated across a dataset costs one request.
///
/// Lives for one run; nothing is persisted. Errors are never cached, so a
/// transient failure is retried the next time the same query shows up.
pub struct CachingGeocoder<G> {
    inner: G,
    forward: Mutex<HashMap<String, Option<Coordinates>>>,
    reverse: Mutex<HashMap<String, Option<Address>>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            forward: Mutex::new(HashMap::new()),
            reverse: Mutex::new(HashMap::new()),
        }
    }
}

/// Coordinates closer than ~10cm share a cache entry
fn coordinate_key(coordinates: Coordinates) -> String {
    format!("{:.6},{:.6}", coordinates.latitude, coordinates.longitude)
}

impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        if let Some(hit) = self.forward.lock().ok().and_then(|c| c.get(query).copied()) {
            log::debug!("Geocode cache hit for '{}'", query);
            return Ok(hit);
        }

        let result = self.inner.forward(query)?;
        if let Ok(mut cache) = self.forward.lock() {
            cache.insert(query.to_string(), result);
        }
        Ok(result)
    }

    fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>, GeocodeError> {
        let key = coordinate_key(coordinates);
        if let Some(hit) = self.reverse.lock().ok().and_then(|c| c.get(&key).cloned()) {
            log::debug!("Reverse geocode cache hit for {}", key);
            return Ok(hit);
        }

        let result = self.inner.reverse(coordinates)?;
        if let Ok(mut cache) = self.reverse.lock() {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }
}
