//! Region primitives: area, centroid, containment, intersection, validation.
//!
//! Everything here except `validate` and `geo_centroid` expects planar regions
//! (meters, see `LocalFrame::project`); tolerances come from `GeomCfg`.

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, EuclideanDistance, InteriorPoint,
    Intersects, Line, LineString, Point,
};
use nalgebra::Vector2;

use super::frame::LocalFrame;
use super::types::{Coordinate, GeomCfg, Region};
use crate::error::GeometryDefect;

/// Unsigned area summed over components.
#[inline]
pub fn area(region: &Region) -> f64 {
    region.to_multi().unsigned_area()
}

/// Area-weighted centroid; `None` for an empty region.
pub fn centroid(region: &Region) -> Option<Vector2<f64>> {
    region.to_multi().centroid().map(|p| Vector2::new(p.x(), p.y()))
}

/// A point guaranteed to lie inside the region (possibly on its boundary).
pub fn interior_point(region: &Region) -> Option<Vector2<f64>> {
    region
        .to_multi()
        .interior_point()
        .map(|p| Vector2::new(p.x(), p.y()))
}

/// Axis-aligned bounding box as `(min, max)` corners.
pub fn bounding_box(region: &Region) -> Option<(Vector2<f64>, Vector2<f64>)> {
    let r = region.to_multi().bounding_rect()?;
    Some((
        Vector2::new(r.min().x, r.min().y),
        Vector2::new(r.max().x, r.max().y),
    ))
}

/// Boundary-inclusive membership: distance to the region at most `eps_m`.
pub fn contains_eps(region: &Region, p: Vector2<f64>, cfg: &GeomCfg) -> bool {
    let pt = Point::new(p.x, p.y);
    region
        .components()
        .iter()
        .any(|poly| pt.euclidean_distance(poly) <= cfg.eps_m)
}

/// No component with area above `eps_m²`.
pub fn is_empty_eps(region: &Region, cfg: &GeomCfg) -> bool {
    region
        .components()
        .iter()
        .all(|p| p.unsigned_area() <= cfg.eps_area())
}

/// Drop components at or below the area threshold.
pub fn prune(region: Region, cfg: &GeomCfg) -> Region {
    match region {
        Region::Empty => Region::Empty,
        other => Region::from_components(
            other
                .components()
                .iter()
                .filter(|p| p.unsigned_area() > cfg.eps_area())
                .cloned(),
        ),
    }
}

/// Pairwise intersection; result may have several components.
pub fn intersect_pair(a: &Region, b: &Region, cfg: &GeomCfg) -> Region {
    if a.is_empty() || b.is_empty() {
        return Region::Empty;
    }
    let out = a.to_multi().intersection(&b.to_multi());
    prune(Region::from(out), cfg)
}

/// Area-weighted centroid of a geographic region, computed in its local frame.
pub fn geo_centroid(region: &Region) -> Option<Coordinate> {
    let frame = LocalFrame::around(std::slice::from_ref(region))?;
    centroid(&frame.project(region)).map(|c| frame.inverse(c))
}

/// Reject degenerate or self-intersecting geographic input.
///
/// An empty region is valid (it simply intersects to nothing).
pub fn validate(region: &Region, cfg: &GeomCfg) -> Result<(), GeometryDefect> {
    for poly in region.components() {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            let pts = ring_vertices(ring)?;
            if pts.len() < 3 {
                return Err(GeometryDefect::TooFewVertices);
            }
            if ring_self_intersects(&pts) {
                return Err(GeometryDefect::SelfIntersecting);
            }
        }
    }
    if let Some(frame) = LocalFrame::around(std::slice::from_ref(region)) {
        let planar = frame.project(region);
        if planar
            .components()
            .iter()
            .any(|p| p.exterior().coords().count() > 0 && p.unsigned_area() <= cfg.eps_area())
        {
            return Err(GeometryDefect::ZeroArea);
        }
    }
    Ok(())
}

/// Ring vertices without the closing point and without consecutive repeats.
fn ring_vertices(ring: &LineString<f64>) -> Result<Vec<Coord<f64>>, GeometryDefect> {
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if !(c.x.is_finite() && c.y.is_finite()) {
            return Err(GeometryDefect::NonFinite);
        }
        if pts.last() != Some(c) {
            pts.push(*c);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    Ok(pts)
}

/// O(n²) test over non-adjacent edge pairs of a closed ring.
fn ring_self_intersects(pts: &[Coord<f64>]) -> bool {
    let n = pts.len();
    let edge = |i: usize| Line::new(pts[i], pts[(i + 1) % n]);
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if edge(i).intersects(&edge(j)) {
                return true;
            }
        }
    }
    false
}
