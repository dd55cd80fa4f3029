//! Mapbox HTTP adapters: Isochrone API (provider) and Directions API (oracle).
//!
//! Status mapping: 401 → Unauthorized, 429 → RateLimited, ≥500 → Upstream,
//! other non-success → Rejected. Empty feature/route lists are reported as
//! `InvalidResponse` / `NoRoute`. The access token never appears in errors.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use rendezvous::collab::{IsochroneProvider, Profile, TravelTimeOracle};
use rendezvous::error::{OracleError, ProviderError};
use rendezvous::geom::{Coordinate, Region};

pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

/// Shared client for both Mapbox endpoints.
#[derive(Clone)]
pub struct MapboxClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MapboxClient {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpFailure> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .query(&[("access_token", self.token.as_str())])
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;
        let status = resp.status();
        debug!(path, status = status.as_u16(), "mapbox_response");
        if !status.is_success() {
            return Err(HttpFailure::Status(status.as_u16()));
        }
        resp.json::<T>().await.map_err(HttpFailure::from_reqwest)
    }
}

/// Transport-level failure before it is mapped to a collaborator error.
#[derive(Debug, Clone, PartialEq)]
enum HttpFailure {
    Timeout,
    Transport(String),
    Decode(String),
    Status(u16),
}

impl HttpFailure {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpFailure::Timeout
        } else if e.is_decode() {
            HttpFailure::Decode(e.without_url().to_string())
        } else {
            HttpFailure::Transport(e.without_url().to_string())
        }
    }
}

impl From<HttpFailure> for ProviderError {
    fn from(f: HttpFailure) -> Self {
        match f {
            HttpFailure::Timeout => ProviderError::Timeout,
            HttpFailure::Transport(m) => ProviderError::Transport(m),
            HttpFailure::Decode(m) => ProviderError::InvalidResponse(m),
            HttpFailure::Status(401) => ProviderError::Unauthorized,
            HttpFailure::Status(429) => ProviderError::RateLimited,
            HttpFailure::Status(s) if s >= 500 => ProviderError::Upstream { status: s },
            HttpFailure::Status(s) => ProviderError::Rejected { status: s },
        }
    }
}

impl From<HttpFailure> for OracleError {
    fn from(f: HttpFailure) -> Self {
        match f {
            HttpFailure::Timeout => OracleError::Timeout,
            HttpFailure::Transport(m) => OracleError::Transport(m),
            HttpFailure::Decode(m) => OracleError::InvalidResponse(m),
            HttpFailure::Status(401) => OracleError::Unauthorized,
            HttpFailure::Status(429) => OracleError::RateLimited,
            HttpFailure::Status(s) if s >= 500 => OracleError::Upstream { status: s },
            HttpFailure::Status(s) => OracleError::Rejected { status: s },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
    #[serde(other)]
    Unsupported,
}

fn rings(raw: &[Vec<[f64; 2]>]) -> Vec<Vec<Coordinate>> {
    raw.iter()
        .map(|ring| ring.iter().map(|&[lng, lat]| Coordinate::new(lng, lat)).collect())
        .collect()
}

/// First feature of an isochrone response as a geographic region.
fn region_from_features(fc: &FeatureCollection) -> Result<Region, ProviderError> {
    let feature = fc
        .features
        .first()
        .ok_or_else(|| ProviderError::InvalidResponse("no isochrone features".into()))?;
    match &feature.geometry {
        Geometry::Polygon { coordinates } => Ok(Region::from_rings(&[rings(coordinates)])),
        Geometry::MultiPolygon { coordinates } => Ok(Region::from_rings(
            &coordinates.iter().map(|p| rings(p)).collect::<Vec<_>>(),
        )),
        Geometry::Unsupported => Err(ProviderError::InvalidResponse(
            "isochrone geometry is not a polygon".into(),
        )),
    }
}

#[async_trait]
impl IsochroneProvider for MapboxClient {
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError> {
        let path = format!(
            "/isochrone/v1/mapbox/{profile}/{:.6},{:.6}",
            origin.lng, origin.lat
        );
        let query = [
            ("contours_minutes", minutes.to_string()),
            ("polygons", "true".to_string()),
        ];
        let fc: FeatureCollection = self.get_json(&path, &query).await?;
        region_from_features(&fc)
    }
}

#[derive(Debug, Deserialize)]
struct Directions {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    duration: f64,
}

#[async_trait]
impl TravelTimeOracle for MapboxClient {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        let path = format!(
            "/directions/v5/mapbox/{profile}/{:.6},{:.6};{:.6},{:.6}",
            origin.lng, origin.lat, destination.lng, destination.lat
        );
        let query = [("overview", "false".to_string())];
        let body: Directions = self.get_json(&path, &query).await?;
        body.routes
            .first()
            .map(|r| r.duration)
            .ok_or(OracleError::NoRoute)
    }
}
