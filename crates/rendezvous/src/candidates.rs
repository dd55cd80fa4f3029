//! Candidate generator: regular grid over the common region plus an anchor point.
//!
//! The region is projected into its own local frame, a square grid with
//! `spacing_m` pitch is laid over the bounding box starting at the minimum
//! corner, and grid points inside the region (boundary inclusive) are kept in
//! row-major order (south to north, west to east). The region centroid is
//! always appended last; for a non-convex region whose centroid falls outside,
//! an interior point is appended instead so that every candidate is inside.
//!
//! There is no cap on the number of candidates; callers bound oracle load
//! through the scoring concurrency limit.

use nalgebra::Vector2;
use tracing::debug;

use crate::error::InputError;
use crate::geom::{ops, Coordinate, GeomCfg, LocalFrame, Region};

/// Candidate meeting points inside `region` (geographic).
///
/// Non-empty whenever `region` is non-empty; the last entry is the anchor.
pub fn generate(
    region: &Region,
    spacing_m: f64,
    cfg: &GeomCfg,
) -> Result<Vec<Coordinate>, InputError> {
    if !(spacing_m.is_finite() && spacing_m > 0.0) {
        return Err(InputError::InvalidGridSpacing(spacing_m));
    }
    let Some(frame) = LocalFrame::around(std::slice::from_ref(region)) else {
        return Ok(Vec::new());
    };
    let planar = frame.project(region);
    let Some((min, max)) = ops::bounding_box(&planar) else {
        return Ok(Vec::new());
    };

    // Lattice points within eps of the far edge still count (boundary inclusive).
    let nx = ((max.x - min.x + cfg.eps_m) / spacing_m).floor() as usize;
    let ny = ((max.y - min.y + cfg.eps_m) / spacing_m).floor() as usize;
    let mut out = Vec::new();
    for j in 0..=ny {
        let y = min.y + j as f64 * spacing_m;
        for i in 0..=nx {
            let p = Vector2::new(min.x + i as f64 * spacing_m, y);
            if ops::contains_eps(&planar, p, cfg) {
                out.push(frame.inverse(p));
            }
        }
    }
    let grid = out.len();

    let anchor = ops::centroid(&planar)
        .filter(|c| ops::contains_eps(&planar, *c, cfg))
        .or_else(|| ops::interior_point(&planar));
    if let Some(a) = anchor {
        out.push(frame.inverse(a));
    }
    debug!(grid, total = out.len(), spacing_m, "candidates_generated");
    Ok(out)
}
