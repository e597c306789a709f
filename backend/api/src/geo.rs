//! Geocoding client and distance helpers.
//!
//! Address resolution is delegated to the mapping provider's REST API;
//! distances between already-geocoded points are computed locally with the
//! haversine formula.

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::errors::Result;
use crate::models::{Coordinates, User};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Filter `users` down to those with known coordinates within `radius_km`
/// of `origin`, sorted nearest-first and capped at `limit`.
pub fn within_radius(
    users: Vec<User>,
    origin: Coordinates,
    radius_km: f64,
    limit: usize,
) -> Vec<User> {
    let mut ranked: Vec<(f64, User)> = users
        .into_iter()
        .filter_map(|u| {
            let coords = u.coordinates()?;
            let distance = haversine_km(origin, coords);
            (distance <= radius_km).then_some((distance, u))
        })
        .collect();

    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, u)| u).collect()
}

// ─────────────────────────────────────────────────────────
// Geocoding REST client
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[derive(Clone)]
pub struct GeocodeClient {
    client: Client,
    api_key: Option<String>,
    geocode_url: String,
}

impl GeocodeClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.maps_api_key.clone(),
            geocode_url: config.maps_geocode_url.clone(),
        }
    }

    /// Resolve a street address to coordinates.
    ///
    /// Returns `Ok(None)` when the provider cannot resolve the address or
    /// when no API key is configured; transport failures surface as errors.
    pub async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let Some(key) = &self.api_key else {
            warn!("MAPS_API_KEY is not set; cannot geocode '{address}'");
            return Ok(None);
        };
        if address.trim().is_empty() {
            return Ok(None);
        }

        let response: GeocodeResponse = self
            .client
            .get(&self.geocode_url)
            .query(&[("address", address), ("key", key.as_str())])
            .send()
            .await?
            .json()
            .await?;

        if response.status == "OK" {
            Ok(response.results.first().map(|r| r.geometry.location))
        } else {
            warn!(
                "Geocoding failed for '{address}': {} {}",
                response.status,
                response.error_message.as_deref().unwrap_or("")
            );
            Ok(None)
        }
    }
}
