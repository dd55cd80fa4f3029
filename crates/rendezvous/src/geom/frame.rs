//! Local metric frame: spherical azimuthal equidistant projection.
//!
//! Distances from the frame center are exact (on the sphere); distortion grows
//! slowly with distance, well below a percent at the tens-of-kilometers scale
//! of reachability polygons. Regions crossing the antimeridian are not supported.

use geo::{BoundingRect, Coord};
use nalgebra::Vector2;

use super::types::{Coordinate, Region, EARTH_RADIUS_M};

/// Projection `Coordinate ↦ Vector2` (meters, x east, y north) around `center`.
#[derive(Clone, Copy, Debug)]
pub struct LocalFrame {
    center: Coordinate,
    sin_lat0: f64,
    cos_lat0: f64,
}

impl LocalFrame {
    pub fn centered_on(center: Coordinate) -> Self {
        let lat0 = center.lat.to_radians();
        Self {
            center,
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos(),
        }
    }

    /// Frame centered on the geographic bounding-box center of all regions.
    ///
    /// The box center does not depend on the order of `regions`. Returns `None`
    /// when every region is empty.
    pub fn around(regions: &[Region]) -> Option<Self> {
        let rect = regions
            .iter()
            .filter_map(|r| r.to_multi().bounding_rect())
            .reduce(|a, b| {
                geo::Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })?;
        let c = rect.center();
        Some(Self::centered_on(Coordinate::from_coord(c)))
    }

    #[inline]
    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn forward(&self, c: Coordinate) -> Vector2<f64> {
        let lat = c.lat.to_radians();
        let dlng = (c.lng - self.center.lng).to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let dlat = lat - self.center.lat.to_radians();
        // Central angle via haversine (well-conditioned near the center).
        let h = (dlat / 2.0).sin().powi(2) + self.cos_lat0 * cos_lat * (dlng / 2.0).sin().powi(2);
        let ang = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
        let k = if ang < 1e-12 { 1.0 } else { ang / ang.sin() };
        let x = EARTH_RADIUS_M * k * cos_lat * dlng.sin();
        let y = EARTH_RADIUS_M * k * (self.cos_lat0 * sin_lat - self.sin_lat0 * cos_lat * dlng.cos());
        Vector2::new(x, y)
    }

    pub fn inverse(&self, p: Vector2<f64>) -> Coordinate {
        let rho = p.norm();
        if rho < 1e-9 {
            return self.center;
        }
        let ang = rho / EARTH_RADIUS_M;
        let (sin_c, cos_c) = ang.sin_cos();
        let lat = (cos_c * self.sin_lat0 + p.y * sin_c * self.cos_lat0 / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let dlng = (p.x * sin_c).atan2(rho * self.cos_lat0 * cos_c - p.y * self.sin_lat0 * sin_c);
        Coordinate::new(wrap_lng(self.center.lng + dlng.to_degrees()), lat.to_degrees())
    }

    /// Geographic region → planar region (meters).
    pub fn project(&self, region: &Region) -> Region {
        region.map_coords(|c| {
            let v = self.forward(Coordinate::from_coord(c));
            Coord { x: v.x, y: v.y }
        })
    }

    /// Planar region (meters) → geographic region.
    pub fn unproject(&self, region: &Region) -> Region {
        region.map_coords(|c| self.inverse(Vector2::new(c.x, c.y)).to_coord())
    }
}

#[inline]
fn wrap_lng(lng: f64) -> f64 {
    let mut x = lng;
    while x < -180.0 {
        x += 360.0;
    }
    while x > 180.0 {
        x -= 360.0;
    }
    x
}
