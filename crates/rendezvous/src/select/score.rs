//! Bounded-concurrency scoring into a complete time matrix.

use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::collab::{Profile, TravelTimeOracle};
use crate::error::{OracleError, Phase, PlanError, PlanResult};
use crate::geom::Coordinate;
use crate::plan::Origin;

/// Concurrency and per-call deadline for oracle lookups.
#[derive(Clone, Copy, Debug)]
pub struct ScoreLimits {
    /// Maximum number of in-flight oracle calls (at least one is used).
    pub concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for ScoreLimits {
    fn default() -> Self {
        Self {
            concurrency: 8,
            call_timeout: Duration::from_secs(20),
        }
    }
}

/// Row-major `candidates × participants` matrix of seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeMatrix {
    candidates: Vec<Coordinate>,
    participants: usize,
    seconds: Vec<f64>,
}

impl TimeMatrix {
    /// Build from explicit rows; `None` if a row length disagrees.
    pub fn from_rows(candidates: Vec<Coordinate>, rows: Vec<Vec<f64>>) -> Option<Self> {
        if candidates.len() != rows.len() {
            return None;
        }
        let participants = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != participants) {
            return None;
        }
        Some(Self {
            candidates,
            participants,
            seconds: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of candidates (rows).
    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[inline]
    pub fn participants(&self) -> usize {
        self.participants
    }

    #[inline]
    pub fn candidate(&self, i: usize) -> Coordinate {
        self.candidates[i]
    }

    pub fn candidates(&self) -> &[Coordinate] {
        &self.candidates
    }

    /// Seconds for candidate `i`, in participant order.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.seconds[i * self.participants..(i + 1) * self.participants]
    }
}

/// Query the oracle for every (candidate, participant) pair.
///
/// At most `limits.concurrency` calls are in flight. The first failure or
/// timeout aborts the whole matrix; on success every cell is filled before
/// this returns.
pub async fn score<O: TravelTimeOracle + ?Sized>(
    oracle: &O,
    origins: &[Origin],
    candidates: &[Coordinate],
    profile: Profile,
    limits: ScoreLimits,
) -> PlanResult<TimeMatrix> {
    let p = origins.len();
    let jobs = (0..candidates.len()).flat_map(|ci| (0..p).map(move |pi| (ci, pi)));
    let cells: Vec<(usize, f64)> = stream::iter(jobs)
        .map(|(ci, pi)| {
            let origin = &origins[pi];
            let destination = candidates[ci];
            async move {
                let call = oracle.travel_time(origin.coordinate, destination, profile);
                let secs = tokio::time::timeout(limits.call_timeout, call)
                    .await
                    .unwrap_or(Err(OracleError::Timeout))
                    .and_then(|s| {
                        if s.is_finite() && s >= 0.0 {
                            Ok(s)
                        } else {
                            Err(OracleError::InvalidResponse(format!("travel time {s}")))
                        }
                    })
                    .map_err(|source| PlanError::Oracle {
                        participant: origin.address.clone(),
                        phase: Phase::Scoring,
                        source,
                    })?;
                Ok::<_, PlanError>((ci * p + pi, secs))
            }
        })
        .buffer_unordered(limits.concurrency.max(1))
        .try_collect()
        .await?;

    let mut seconds = vec![f64::NAN; candidates.len() * p];
    for (idx, secs) in cells {
        seconds[idx] = secs;
    }
    debug!(
        candidates = candidates.len(),
        participants = p,
        concurrency = limits.concurrency,
        "scoring_complete"
    );
    Ok(TimeMatrix {
        candidates: candidates.to_vec(),
        participants: p,
        seconds,
    })
}
