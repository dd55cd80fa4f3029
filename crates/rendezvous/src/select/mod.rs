//! Objective evaluator and selector.
//!
//! Purpose
//! - Turn a complete (candidate × participant) travel-time matrix into one
//!   chosen meeting point under `min_sum` or `min_max`.
//!
//! Rules
//! - A candidate is rejected if any participant's time strictly exceeds the
//!   budget (non-finite times are rejected as well).
//! - Among accepted candidates the smallest objective value wins; exact ties
//!   go to the candidate closer to the unweighted mean of participant
//!   coordinates, then to the smaller `(lng, lat)`.
//! - Selection only looks at the finished matrix, so it does not depend on the
//!   order in which oracle calls completed.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::geom::Coordinate;

mod score;

pub use score::{score, ScoreLimits, TimeMatrix};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    MinSum,
    MinMax,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::MinSum => "min_sum",
            Objective::MinMax => "min_max",
        }
    }

    /// Objective value of one row of travel times (seconds).
    pub fn value(&self, times: &[f64]) -> f64 {
        match self {
            Objective::MinSum => times.iter().sum(),
            Objective::MinMax => times.iter().copied().fold(0.0, f64::max),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Objective {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min_sum" => Ok(Objective::MinSum),
            "min_max" => Ok(Objective::MinMax),
            _ => Err(InputError::UnknownObjective(s.to_string())),
        }
    }
}

/// Scored candidate: location, per-participant seconds, objective value.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub coordinate: Coordinate,
    /// Seconds, in participant order.
    pub times: Vec<f64>,
    pub objective_value: f64,
}

/// Best accepted candidate, or `None` when every candidate breaks the budget.
pub fn select(
    matrix: &TimeMatrix,
    participants: &[Coordinate],
    objective: Objective,
    budget_seconds: f64,
) -> Option<Candidate> {
    let focus = Coordinate::mean(participants);
    let mut best: Option<(usize, f64, f64)> = None;
    for i in 0..matrix.len() {
        let row = matrix.row(i);
        if !within_budget(row, budget_seconds) {
            continue;
        }
        let value = objective.value(row);
        let here = matrix.candidate(i);
        let dist = focus.map_or(0.0, |f| f.haversine_m(&here));
        let better = match best {
            None => true,
            Some((j, best_value, best_dist)) => {
                rank(value, dist, &here, best_value, best_dist, &matrix.candidate(j))
                    == Ordering::Less
            }
        };
        if better {
            best = Some((i, value, dist));
        }
    }
    best.map(|(i, value, _)| Candidate {
        coordinate: matrix.candidate(i),
        times: matrix.row(i).to_vec(),
        objective_value: value,
    })
}

#[inline]
fn within_budget(row: &[f64], budget_seconds: f64) -> bool {
    // NaN compares false and is rejected.
    row.iter().all(|t| *t <= budget_seconds)
}

/// `Less` means candidate `a` is preferred over `b`.
fn rank(
    a_value: f64,
    a_dist: f64,
    a: &Coordinate,
    b_value: f64,
    b_dist: f64,
    b: &Coordinate,
) -> Ordering {
    a_value
        .total_cmp(&b_value)
        .then_with(|| a_dist.total_cmp(&b_dist))
        .then_with(|| a.lexical_cmp(b))
}
