//! Deterministic collaborators that need no network.
//!
//! `DiscIsochrones` approximates reachability as a disc of radius
//! `speed × minutes` (optionally with seeded radial jitter), and
//! `StraightLineOracle` returns great-circle distance over speed. They are
//! consistent with each other: a point inside an unjittered disc is reachable
//! within the budget along the straight line.

use async_trait::async_trait;

use super::{IsochroneProvider, Profile, TravelTimeOracle};
use crate::error::{OracleError, ProviderError};
use crate::geom::rand::{star_polygon, ReplayToken, StarCfg};
use crate::geom::{Coordinate, LocalFrame, Region};

/// Default travel speeds in meters per second.
#[derive(Clone, Copy, Debug)]
pub struct Speeds {
    pub walking: f64,
    pub driving: f64,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            walking: 1.42,
            driving: 11.0,
        }
    }
}

impl Speeds {
    #[inline]
    pub fn for_profile(&self, profile: Profile) -> f64 {
        match profile {
            Profile::Walking => self.walking,
            Profile::Driving => self.driving,
        }
    }
}

/// Disc-shaped isochrones built in each origin's local frame.
#[derive(Clone, Debug, Default)]
pub struct DiscIsochrones {
    pub speeds: Speeds,
    pub shape: StarCfg,
    /// Seed for radial jitter; `None` gives regular polygons.
    pub seed: Option<u64>,
}

impl DiscIsochrones {
    pub fn radius_m(&self, profile: Profile, minutes: u32) -> f64 {
        self.speeds.for_profile(profile) * f64::from(minutes) * 60.0
    }

    fn token(&self, origin: Coordinate, minutes: u32) -> Option<ReplayToken> {
        self.seed.map(|seed| ReplayToken {
            seed,
            index: origin.lng.to_bits() ^ origin.lat.to_bits().rotate_left(17) ^ u64::from(minutes),
        })
    }
}

#[async_trait]
impl IsochroneProvider for DiscIsochrones {
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError> {
        if !origin.is_valid() {
            return Err(ProviderError::Rejected { status: 422 });
        }
        let radius = self.radius_m(profile, minutes);
        let planar = star_polygon(radius, self.shape, self.token(origin, minutes));
        Ok(LocalFrame::centered_on(origin).unproject(&Region::Single(planar)))
    }
}

/// Great-circle travel time with a constant detour factor.
#[derive(Clone, Copy, Debug)]
pub struct StraightLineOracle {
    pub speeds: Speeds,
    /// Multiplier on the straight-line distance (>= 1 for road networks).
    pub detour: f64,
}

impl Default for StraightLineOracle {
    fn default() -> Self {
        Self {
            speeds: Speeds::default(),
            detour: 1.0,
        }
    }
}

#[async_trait]
impl TravelTimeOracle for StraightLineOracle {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(OracleError::NoRoute);
        }
        Ok(origin.haversine_m(&destination) * self.detour / self.speeds.for_profile(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{ops, GeomCfg};

    #[tokio::test]
    async fn disc_radius_matches_speed_and_budget() {
        let provider = DiscIsochrones::default();
        let origin = Coordinate::new(2.35, 48.85);
        let region = provider.fetch(origin, Profile::Walking, 15).await.unwrap();
        let expected = 1.42 * 15.0 * 60.0;
        let frame = LocalFrame::centered_on(origin);
        let planar = frame.project(&region);
        for c in planar.components()[0].exterior().coords() {
            let r = (c.x * c.x + c.y * c.y).sqrt();
            assert!((r - expected).abs() < 1e-3 * expected, "r={r}");
        }
        assert!(ops::validate(&region, &GeomCfg::default()).is_ok());
    }

    #[tokio::test]
    async fn jittered_discs_are_reproducible_and_valid() {
        let provider = DiscIsochrones {
            shape: StarCfg {
                vertices: 48,
                radial_jitter: 0.3,
            },
            seed: Some(7),
            ..Default::default()
        };
        let origin = Coordinate::new(-0.12, 51.5);
        let a = provider.fetch(origin, Profile::Walking, 20).await.unwrap();
        let b = provider.fetch(origin, Profile::Walking, 20).await.unwrap();
        assert_eq!(a, b);
        assert!(ops::validate(&a, &GeomCfg::default()).is_ok());
    }

    #[tokio::test]
    async fn straight_line_time_is_distance_over_speed() {
        let oracle = StraightLineOracle::default();
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.01);
        let t = oracle.travel_time(a, b, Profile::Driving).await.unwrap();
        let d = a.haversine_m(&b);
        assert!((t - d / 11.0).abs() < 1e-9);
    }
}
