//! Region intersector: N participant regions → one common reachable component.
//!
//! Regions are projected into a shared local frame (centered on the bounding
//! box of all inputs, so the frame does not depend on input order), folded
//! pairwise in input order, and reduced to a single component:
//! - largest planar area wins (areas within `eps_m²` tie);
//! - ties go to the smallest centroid longitude, then latitude.
//!
//! An empty result is a normal outcome, not an error.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::InputError;
use crate::geom::{ops, Coordinate, GeomCfg, LocalFrame, Region};

/// Common region of all `regions` (geographic in, geographic out).
pub fn intersect(regions: &[Region], cfg: &GeomCfg) -> Result<Region, InputError> {
    if regions.is_empty() {
        return Err(InputError::NoRegions);
    }
    if regions.iter().any(Region::is_empty) {
        return Ok(Region::Empty);
    }
    let Some(frame) = LocalFrame::around(regions) else {
        return Ok(Region::Empty);
    };
    let mut planar = regions.iter().map(|r| ops::prune(frame.project(r), cfg));
    let first = planar.next().unwrap_or_default();
    let common = planar.try_fold(first, |acc, r| {
        let next = ops::intersect_pair(&acc, &r, cfg);
        // Stop folding once nothing is left.
        if ops::is_empty_eps(&next, cfg) {
            Err(())
        } else {
            Ok(next)
        }
    });
    let common = match common {
        Ok(c) => c,
        Err(()) => return Ok(Region::Empty),
    };
    debug!(
        inputs = regions.len(),
        components = common.components().len(),
        "regions_intersected"
    );
    Ok(select_component(&common, &frame, cfg))
}

/// Keep the component with the largest area (planar input, geographic output).
pub fn select_component(planar: &Region, frame: &LocalFrame, cfg: &GeomCfg) -> Region {
    let mut best: Option<(f64, Coordinate, &geo::Polygon<f64>)> = None;
    for poly in planar.components() {
        let single = Region::Single(poly.clone());
        let area = ops::area(&single);
        if area <= cfg.eps_area() {
            continue;
        }
        let Some(c) = ops::centroid(&single) else {
            continue;
        };
        let key = frame.inverse(c);
        let better = match &best {
            None => true,
            Some((best_area, best_key, _)) => {
                compare_components(area, &key, *best_area, best_key, cfg) == Ordering::Less
            }
        };
        if better {
            best = Some((area, key, poly));
        }
    }
    match best {
        Some((_, _, poly)) => frame.unproject(&Region::Single(poly.clone())),
        None => Region::Empty,
    }
}

/// `Less` means `(a_area, a_key)` is preferred over `(b_area, b_key)`.
fn compare_components(
    a_area: f64,
    a_key: &Coordinate,
    b_area: f64,
    b_key: &Coordinate,
    cfg: &GeomCfg,
) -> Ordering {
    if (a_area - b_area).abs() > cfg.eps_area() {
        // Larger area first.
        return b_area.total_cmp(&a_area);
    }
    a_key.lexical_cmp(b_key)
}
