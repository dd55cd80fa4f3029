//! Geometry kernel: geographic and planar regions.
//!
//! Purpose
//! - Represent reachability polygons as a tagged `Region` and provide the few
//!   operations the planner needs: reprojection into a local metric frame,
//!   area, centroid, boundary-inclusive containment, and pairwise intersection.
//! - Keep numerics explicit: one epsilon (`GeomCfg::eps_m`) drives both
//!   emptiness and containment.
//!
//! Frames
//! - Geographic regions store `x = lng`, `y = lat` (degrees).
//! - Planar regions store meters in a `LocalFrame` (azimuthal equidistant).
//!   Area, containment and intersection are only meaningful in planar form.

mod frame;
pub mod ops;
pub mod rand;
mod types;

pub use frame::LocalFrame;
pub use ops::{contains_eps, geo_centroid, intersect_pair, is_empty_eps, validate};
pub use types::{Coordinate, GeomCfg, Region, EARTH_RADIUS_M};
