//! Interfaces to the external collaborators the planner calls.
//!
//! - `IsochroneProvider`: reachability polygon for an origin and time budget.
//! - `TravelTimeOracle`: point-to-point travel duration in seconds.
//!
//! Both are async and must be `Send + Sync`; the planner issues oracle calls
//! concurrently. `cache` decorates either with an injected lookup cache and
//! `offline` provides deterministic implementations for demos and tests.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InputError, OracleError, ProviderError};
use crate::geom::{Coordinate, Region};

pub mod cache;
pub mod offline;

pub use cache::{normalize_key, CacheStats, CachedOracle, CachedProvider, LookupCache};
pub use offline::{DiscIsochrones, StraightLineOracle};

/// Travel mode; affects both isochrone shape and travel times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Walking,
    Driving,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Walking => "walking",
            Profile::Driving => "driving",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = InputError;

    /// Case-insensitive; accepts a `mapbox/` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("mapbox/").unwrap_or(&lower);
        match name {
            "walking" => Ok(Profile::Walking),
            "driving" => Ok(Profile::Driving),
            _ => Err(InputError::UnknownProfile(s.to_string())),
        }
    }
}

/// Source of reachability polygons.
#[async_trait]
pub trait IsochroneProvider: Send + Sync {
    /// Geographic region reachable from `origin` within `minutes`.
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError>;
}

/// Source of point-to-point travel durations.
#[async_trait]
pub trait TravelTimeOracle: Send + Sync {
    /// Travel time in seconds from `origin` to `destination`.
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError>;
}

#[async_trait]
impl<T: IsochroneProvider + ?Sized> IsochroneProvider for Arc<T> {
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError> {
        (**self).fetch(origin, profile, minutes).await
    }
}

#[async_trait]
impl<T: TravelTimeOracle + ?Sized> TravelTimeOracle for Arc<T> {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        (**self).travel_time(origin, destination, profile).await
    }
}
