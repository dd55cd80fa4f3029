//! Seeded star-shaped polygons in the planar frame (synthetic reachability areas).
//!
//! Model
//! - Start from `n` equally spaced bearings on [0, 2π) and a base radius.
//! - Optionally perturb each radius by a bounded relative jitter; angles stay
//!   sorted so the ring is star-shaped around the origin and never
//!   self-intersects.
//! - Determinism uses a replay token `(seed, index)` mixed into a single RNG.

use geo::{Coord, LineString, Polygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Star polygon sampler configuration.
#[derive(Clone, Copy, Debug)]
pub struct StarCfg {
    /// Number of ring vertices; values below 3 are raised to 3.
    pub vertices: usize,
    /// Relative radial jitter. Radii = `radius * (1 + u)`, `u ∈ [-jitter, jitter]`,
    /// clamped to [0, 0.9].
    pub radial_jitter: f64,
}

impl Default for StarCfg {
    fn default() -> Self {
        Self {
            vertices: 64,
            radial_jitter: 0.0,
        }
    }
}

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    #[inline]
    fn to_std_rng(self) -> StdRng {
        // SplitMix64-style mixing.
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

/// Star polygon centered on the planar origin with mean radius `radius` (meters).
///
/// Without jitter (or without a token) this is the regular n-gon inscribed in
/// the circle of that radius.
pub fn star_polygon(radius: f64, cfg: StarCfg, tok: Option<ReplayToken>) -> Polygon<f64> {
    let n = cfg.vertices.max(3);
    let jitter = cfg.radial_jitter.clamp(0.0, 0.9);
    let mut rng = tok.map(ReplayToken::to_std_rng);
    let delta = std::f64::consts::TAU / n as f64;
    let ring: LineString<f64> = (0..n)
        .map(|k| {
            let th = k as f64 * delta;
            let u = match rng.as_mut() {
                Some(r) if jitter > 0.0 => (r.gen::<f64>() * 2.0 - 1.0) * jitter,
                _ => 0.0,
            };
            let r = radius * (1.0 + u);
            Coord {
                x: th.cos() * r,
                y: th.sin() * r,
            }
        })
        .collect();
    Polygon::new(ring, vec![])
}
