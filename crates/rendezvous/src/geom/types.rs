//! Basic geographic types and the tolerance used by all planar predicates.
//!
//! - `GeomCfg`: the single epsilon shared by emptiness and containment checks.
//! - `Coordinate`: immutable (longitude, latitude) pair in degrees.
//! - `Region`: tagged polygon variant; the frame (geographic or planar) is
//!   decided by the caller, see `frame::LocalFrame`.

use std::cmp::Ordering;

use geo::{Coord, LineString, MapCoords, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Geometry configuration (tolerances).
///
/// `eps_m` is measured in meters of the local planar frame. A point counts as
/// inside a region when its distance to the region is at most `eps_m`; a
/// component counts as non-empty when its area exceeds `eps_m²`. Both checks
/// derive from the same value so that a boundary point of a non-empty region
/// is never rejected.
#[derive(Clone, Copy, Debug)]
pub struct GeomCfg {
    pub eps_m: f64,
}

impl Default for GeomCfg {
    fn default() -> Self {
        Self { eps_m: 1e-3 }
    }
}

impl GeomCfg {
    #[inline]
    pub fn eps_area(&self) -> f64 {
        self.eps_m * self.eps_m
    }
}

/// Geographic coordinate in degrees (WGS84 longitude/latitude).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Finite and inside `[-180, 180] × [-90, 90]`.
    pub fn is_valid(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }

    #[inline]
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    #[inline]
    pub fn from_coord(c: Coord<f64>) -> Self {
        Self { lng: c.x, lat: c.y }
    }

    /// Great-circle distance in meters (haversine).
    pub fn haversine_m(&self, other: &Coordinate) -> f64 {
        let (p1, p2) = (self.lat.to_radians(), other.lat.to_radians());
        let dp = p2 - p1;
        let dl = (other.lng - self.lng).to_radians();
        let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).max(0.0).sqrt())
    }

    /// Lexicographic order on `(lng, lat)`; total even for NaN.
    #[inline]
    pub fn lexical_cmp(&self, other: &Coordinate) -> Ordering {
        self.lng
            .total_cmp(&other.lng)
            .then_with(|| self.lat.total_cmp(&other.lat))
    }

    /// Unweighted mean of a set of coordinates.
    pub fn mean(points: &[Coordinate]) -> Option<Coordinate> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), c| (sx + c.lng, sy + c.lat));
        Some(Coordinate::new(sx / n, sy / n))
    }
}

/// Polygonal region: empty, one polygon, or several disjoint components.
///
/// Invariants (for regions produced by this crate):
/// - components are non-self-intersecting;
/// - `Multi` holds at least two components (see `from_components`).
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Region {
    #[default]
    Empty,
    Single(Polygon<f64>),
    Multi(Vec<Polygon<f64>>),
}

impl Region {
    /// Normalize a component list into the tagged variant.
    pub fn from_components<I: IntoIterator<Item = Polygon<f64>>>(components: I) -> Self {
        let mut polys: Vec<Polygon<f64>> = components.into_iter().collect();
        match polys.len() {
            0 => Region::Empty,
            1 => Region::Single(polys.remove(0)),
            _ => Region::Multi(polys),
        }
    }

    /// Simple polygon from an exterior ring of geographic coordinates (ring is closed
    /// automatically).
    pub fn from_ring(ring: &[Coordinate]) -> Self {
        if ring.is_empty() {
            return Region::Empty;
        }
        let exterior: LineString<f64> = ring.iter().map(|c| c.to_coord()).collect();
        Region::Single(Polygon::new(exterior, vec![]))
    }

    /// Components given as ring lists (first ring exterior, the rest holes),
    /// as in GeoJSON Polygon/MultiPolygon coordinates. Ring-less components
    /// are skipped.
    pub fn from_rings(components: &[Vec<Vec<Coordinate>>]) -> Self {
        let to_ring = |ring: &Vec<Coordinate>| -> LineString<f64> {
            ring.iter().map(|c| c.to_coord()).collect()
        };
        Region::from_components(components.iter().filter_map(|rings| {
            let (exterior, holes) = rings.split_first()?;
            Some(Polygon::new(
                to_ring(exterior),
                holes.iter().map(to_ring).collect(),
            ))
        }))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components().is_empty()
    }

    pub fn components(&self) -> &[Polygon<f64>] {
        match self {
            Region::Empty => &[],
            Region::Single(p) => std::slice::from_ref(p),
            Region::Multi(ps) => ps,
        }
    }

    pub fn to_multi(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.components().to_vec())
    }

    /// Apply a coordinate map to every vertex (used for reprojection).
    pub fn map_coords<F>(&self, f: F) -> Region
    where
        F: Fn(Coord<f64>) -> Coord<f64> + Copy,
    {
        Region::from_components(self.components().iter().map(|p| p.map_coords(f)))
    }
}

impl From<MultiPolygon<f64>> for Region {
    fn from(mp: MultiPolygon<f64>) -> Self {
        Region::from_components(mp.0)
    }
}

impl From<Polygon<f64>> for Region {
    fn from(p: Polygon<f64>) -> Self {
        Region::Single(p)
    }
}
