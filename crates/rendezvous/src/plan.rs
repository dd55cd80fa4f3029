//! Planner: request normalization and the end-to-end pipeline.
//!
//! Phases run in sequence: fetch and intersect (relaxing the budget at most
//! once), generate candidates, score them against every participant, select.
//! Infeasibility is an `Outcome`; only bad input and upstream failures are
//! errors.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::candidates;
use crate::collab::{normalize_key, IsochroneProvider, Profile, TravelTimeOracle};
use crate::error::{InputError, PlanResult};
use crate::geom::{Coordinate, GeomCfg, Region};
use crate::relax::{self, BudgetPolicy, Relaxation};
use crate::select::{self, Objective, ScoreLimits};

/// Planner configuration.
#[derive(Clone, Copy, Debug)]
pub struct PlanCfg {
    pub budget: BudgetPolicy,
    pub geom: GeomCfg,
    /// Default candidate grid pitch in meters.
    pub grid_spacing_m: f64,
    /// Finest pitch a request may ask for; finer grids are rejected as input.
    pub min_grid_spacing_m: f64,
    pub max_participants: usize,
    /// Upper bound on in-flight oracle calls while scoring.
    pub oracle_concurrency: usize,
    /// Deadline for each provider or oracle call.
    pub call_timeout: Duration,
    /// Keep the candidate set on the result for debugging.
    pub debug_candidates: bool,
}

impl Default for PlanCfg {
    fn default() -> Self {
        Self {
            budget: BudgetPolicy::default(),
            geom: GeomCfg::default(),
            grid_spacing_m: 200.0,
            min_grid_spacing_m: 10.0,
            max_participants: 10,
            oracle_concurrency: 8,
            call_timeout: Duration::from_secs(20),
            debug_candidates: true,
        }
    }
}

impl PlanCfg {
    #[inline]
    pub fn score_limits(&self) -> ScoreLimits {
        ScoreLimits {
            concurrency: self.oracle_concurrency,
            call_timeout: self.call_timeout,
        }
    }
}

/// Participant as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// Meeting request as received (JSON).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub participants: Vec<ParticipantInput>,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub max_minutes: Option<u32>,
    #[serde(default = "default_objective")]
    pub objective: String,
    #[serde(default)]
    pub grid_resolution_m: Option<f64>,
}

fn default_profile() -> String {
    Profile::Walking.as_str().to_string()
}

fn default_objective() -> String {
    Objective::default().as_str().to_string()
}

/// Labeled starting point.
#[derive(Clone, Debug, PartialEq)]
pub struct Origin {
    pub address: String,
    pub coordinate: Coordinate,
}

impl Origin {
    pub fn new(address: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            address: address.into(),
            coordinate,
        }
    }
}

/// Origin together with its reachability region at the effective budget.
#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    pub address: String,
    pub coordinate: Coordinate,
    pub region: Region,
}

/// Validated request.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRequest {
    pub origins: Vec<Origin>,
    pub profile: Profile,
    pub max_minutes: u32,
    pub objective: Objective,
    pub grid_spacing_m: f64,
}

impl MeetingRequest {
    /// Trim and deduplicate addresses, then check every field against `cfg`.
    ///
    /// Blank addresses are dropped; duplicates compare case-insensitively and
    /// the first occurrence is kept. The participant cap applies to the
    /// non-blank entries before duplicates are removed.
    pub fn normalize(&self, cfg: &PlanCfg) -> Result<NormalizedRequest, InputError> {
        let non_blank = self
            .participants
            .iter()
            .filter(|p| !p.address.trim().is_empty())
            .count();
        if non_blank > cfg.max_participants {
            return Err(InputError::TooManyParticipants {
                max: cfg.max_participants,
                got: non_blank,
            });
        }
        let mut seen = HashSet::new();
        let mut origins = Vec::with_capacity(self.participants.len());
        for p in &self.participants {
            let address = p.address.trim();
            if address.is_empty() || !seen.insert(normalize_key(address)) {
                continue;
            }
            let coordinate = Coordinate::new(p.lng, p.lat);
            if !coordinate.is_valid() {
                return Err(InputError::InvalidCoordinate {
                    participant: address.to_string(),
                    lng: p.lng,
                    lat: p.lat,
                });
            }
            origins.push(Origin::new(address, coordinate));
        }
        if origins.is_empty() {
            return Err(InputError::NoParticipants);
        }
        let max_minutes = cfg
            .budget
            .validate(self.max_minutes.unwrap_or(cfg.budget.default))?;
        let grid_spacing_m = match self.grid_resolution_m {
            Some(s) if s.is_finite() && s > 0.0 => s,
            Some(s) => return Err(InputError::InvalidGridSpacing(s)),
            None => cfg.grid_spacing_m,
        };
        if grid_spacing_m < cfg.min_grid_spacing_m {
            return Err(InputError::GridSpacingTooFine {
                min: cfg.min_grid_spacing_m,
                got: grid_spacing_m,
            });
        }
        Ok(NormalizedRequest {
            origins,
            profile: self.profile.parse()?,
            max_minutes,
            objective: self.objective.parse()?,
            grid_spacing_m,
        })
    }
}

/// How the meeting point was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Best candidate under the objective.
    Optimized,
    /// No candidate met the budget; the region anchor was used instead.
    CentroidFallback,
}

/// Travel time of one participant to the chosen point.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantEta {
    pub address: String,
    pub coordinate: Coordinate,
    pub seconds: f64,
}

/// Successful plan.
#[derive(Clone, Debug, PartialEq)]
pub struct Meeting {
    pub meeting_point: Coordinate,
    pub participants: Vec<ParticipantEta>,
    pub objective: Objective,
    /// Seconds; `None` for `SelectionKind::CentroidFallback`.
    pub objective_value: Option<f64>,
    pub selection: SelectionKind,
    pub effective_budget: u32,
    pub relaxed: bool,
    pub common_region: Region,
    /// Scored candidates, kept when `PlanCfg::debug_candidates` is set.
    pub candidates: Option<Vec<Coordinate>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnreachableReason {
    NoCommonReachableRegion,
}

impl UnreachableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnreachableReason::NoCommonReachableRegion => "no_common_reachable_region",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Reachable(Meeting),
    Unreachable {
        reason: UnreachableReason,
        effective_budget: u32,
    },
}

impl Outcome {
    pub fn effective_budget(&self) -> u32 {
        match self {
            Outcome::Reachable(m) => m.effective_budget,
            Outcome::Unreachable {
                effective_budget, ..
            } => *effective_budget,
        }
    }

    pub fn meeting(&self) -> Option<&Meeting> {
        match self {
            Outcome::Reachable(m) => Some(m),
            Outcome::Unreachable { .. } => None,
        }
    }
}

/// Fair meeting point planner over injected collaborators.
pub struct Planner<P, O> {
    provider: P,
    oracle: O,
    cfg: PlanCfg,
}

impl<P: IsochroneProvider, O: TravelTimeOracle> Planner<P, O> {
    pub fn new(provider: P, oracle: O, cfg: PlanCfg) -> Self {
        Self {
            provider,
            oracle,
            cfg,
        }
    }

    pub fn cfg(&self) -> &PlanCfg {
        &self.cfg
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Normalize `request` and run the pipeline.
    pub async fn plan(&self, request: &MeetingRequest) -> PlanResult<Outcome> {
        let request = request.normalize(&self.cfg)?;
        self.plan_normalized(&request).await
    }

    pub async fn plan_normalized(&self, request: &NormalizedRequest) -> PlanResult<Outcome> {
        info!(
            participants = request.origins.len(),
            profile = %request.profile,
            max_minutes = request.max_minutes,
            objective = %request.objective,
            "plan_started"
        );
        let relaxation = Relaxation::new(request.max_minutes, self.cfg.budget)?;
        let resolved = relax::resolve(
            &self.provider,
            &request.origins,
            request.profile,
            relaxation,
            &self.cfg.geom,
            self.cfg.call_timeout,
        )
        .await?;
        let effective_budget = resolved.relaxation.budget();
        if !resolved.succeeded() {
            return Ok(Outcome::Unreachable {
                reason: UnreachableReason::NoCommonReachableRegion,
                effective_budget,
            });
        }

        let points = candidates::generate(&resolved.common, request.grid_spacing_m, &self.cfg.geom)?;
        if points.is_empty() {
            warn!(effective_budget, "common_region_without_candidates");
            return Ok(Outcome::Unreachable {
                reason: UnreachableReason::NoCommonReachableRegion,
                effective_budget,
            });
        }
        let matrix = select::score(
            &self.oracle,
            &request.origins,
            &points,
            request.profile,
            self.cfg.score_limits(),
        )
        .await?;

        let coords: Vec<Coordinate> = request.origins.iter().map(|o| o.coordinate).collect();
        let budget_seconds = f64::from(effective_budget) * 60.0;
        let (point, times, objective_value, selection) =
            match select::select(&matrix, &coords, request.objective, budget_seconds) {
                Some(best) => (
                    best.coordinate,
                    best.times,
                    Some(best.objective_value),
                    SelectionKind::Optimized,
                ),
                None => {
                    // The anchor is the last generated candidate.
                    let anchor = matrix.len() - 1;
                    warn!(
                        candidates = matrix.len(),
                        budget_seconds, "no_candidate_within_budget"
                    );
                    (
                        matrix.candidate(anchor),
                        matrix.row(anchor).to_vec(),
                        None,
                        SelectionKind::CentroidFallback,
                    )
                }
            };

        info!(
            lng = point.lng,
            lat = point.lat,
            effective_budget,
            relaxed = resolved.relaxation.relaxed(),
            ?selection,
            "meeting_point_selected"
        );
        let participants = request
            .origins
            .iter()
            .zip(times)
            .map(|(o, seconds)| ParticipantEta {
                address: o.address.clone(),
                coordinate: o.coordinate,
                seconds,
            })
            .collect();
        Ok(Outcome::Reachable(Meeting {
            meeting_point: point,
            participants,
            objective: request.objective,
            objective_value,
            selection,
            effective_budget,
            relaxed: resolved.relaxation.relaxed(),
            common_region: resolved.common,
            candidates: self.cfg.debug_candidates.then_some(points),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(address: &str, lng: f64, lat: f64) -> ParticipantInput {
        ParticipantInput {
            address: address.to_string(),
            lat,
            lng,
        }
    }

    fn request(participants: Vec<ParticipantInput>) -> MeetingRequest {
        MeetingRequest {
            participants,
            profile: "walking".into(),
            max_minutes: None,
            objective: "min_sum".into(),
            grid_resolution_m: None,
        }
    }

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let req: MeetingRequest = serde_json::from_str(
            r#"{"participants":[{"address":"Alexanderplatz","lat":52.5219,"lng":13.4132}]}"#,
        )
        .unwrap();
        let n = req.normalize(&PlanCfg::default()).unwrap();
        assert_eq!(n.max_minutes, 15);
        assert_eq!(n.profile, Profile::Walking);
        assert_eq!(n.objective, Objective::MinSum);
        assert_eq!(n.grid_spacing_m, 200.0);
        assert_eq!(n.origins[0].coordinate, Coordinate::new(13.4132, 52.5219));
    }

    #[test]
    fn addresses_are_trimmed_and_deduplicated() {
        let req = request(vec![
            person("  Main St 1 ", 0.0, 0.0),
            person("   ", 1.0, 1.0),
            person("main st 1", 2.0, 2.0),
            person("Elm St", 3.0, 3.0),
        ]);
        let n = req.normalize(&PlanCfg::default()).unwrap();
        let names: Vec<&str> = n.origins.iter().map(|o| o.address.as_str()).collect();
        assert_eq!(names, ["Main St 1", "Elm St"]);
        assert_eq!(n.origins[0].coordinate, Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn rejects_bad_inputs() {
        let cfg = PlanCfg::default();
        assert_eq!(
            request(vec![person(" ", 0.0, 0.0)]).normalize(&cfg),
            Err(InputError::NoParticipants)
        );
        let eleven = (0..11).map(|i| person(&format!("p{i}"), 0.0, 0.0)).collect();
        assert!(matches!(
            request(eleven).normalize(&cfg),
            Err(InputError::TooManyParticipants { max: 10, got: 11 })
        ));
        assert!(matches!(
            request(vec![person("a", 200.0, 0.0)]).normalize(&cfg),
            Err(InputError::InvalidCoordinate { .. })
        ));

        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.max_minutes = Some(61);
        assert!(matches!(
            r.normalize(&cfg),
            Err(InputError::BudgetOutOfRange { got: 61, .. })
        ));

        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.grid_resolution_m = Some(0.0);
        assert_eq!(r.normalize(&cfg), Err(InputError::InvalidGridSpacing(0.0)));

        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.grid_resolution_m = Some(0.001);
        assert_eq!(
            r.normalize(&cfg),
            Err(InputError::GridSpacingTooFine {
                min: 10.0,
                got: 0.001
            })
        );

        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.profile = "cycling".into();
        assert!(matches!(r.normalize(&cfg), Err(InputError::UnknownProfile(_))));

        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.objective = "fastest".into();
        assert!(matches!(r.normalize(&cfg), Err(InputError::UnknownObjective(_))));
    }

    #[test]
    fn profile_and_objective_names_are_lenient() {
        let mut r = request(vec![person("a", 0.0, 0.0)]);
        r.profile = "Mapbox/Driving".into();
        r.objective = "MIN_MAX".into();
        r.max_minutes = Some(60);
        r.grid_resolution_m = Some(75.0);
        let n = r.normalize(&PlanCfg::default()).unwrap();
        assert_eq!(n.profile, Profile::Driving);
        assert_eq!(n.objective, Objective::MinMax);
        assert_eq!(n.max_minutes, 60);
        assert_eq!(n.grid_spacing_m, 75.0);
    }

    #[test]
    fn participant_cap_counts_duplicates() {
        let cfg = PlanCfg::default();
        let mut eleven: Vec<_> = (0..10).map(|i| person(&format!("p{i}"), 0.0, 0.0)).collect();
        eleven.push(person(" P3 ", 1.0, 1.0));
        assert_eq!(
            request(eleven.clone()).normalize(&cfg),
            Err(InputError::TooManyParticipants { max: 10, got: 11 })
        );

        // Blank entries do not count toward the cap.
        eleven.pop();
        eleven.push(person("  ", 1.0, 1.0));
        assert_eq!(request(eleven).normalize(&cfg).unwrap().origins.len(), 10);
    }

    #[test]
    fn default_grid_spacing_is_checked_too() {
        let cfg = PlanCfg {
            grid_spacing_m: 1.0,
            ..PlanCfg::default()
        };
        assert!(matches!(
            request(vec![person("a", 0.0, 0.0)]).normalize(&cfg),
            Err(InputError::GridSpacingTooFine { .. })
        ));
    }
}
