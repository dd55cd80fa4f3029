//! Relaxation controller: widen the time budget once when nothing is common.
//!
//! State machine
//! - `Initial`: regions are fetched at the requested budget and intersected.
//! - non-empty → `Succeeded`.
//! - empty and `budget + increment <= max` → `Relaxed` (budget raised once),
//!   regions are fetched again and intersected again.
//! - empty with no room to relax, or empty again after relaxing → `Failed`.
//!
//! `Succeeded` and `Failed` are terminal; at most one relaxation ever happens.

use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::collab::{IsochroneProvider, Profile};
use crate::error::{InputError, Phase, PlanError, PlanResult, ProviderError};
use crate::geom::{ops, GeomCfg, Region};
use crate::plan::{Origin, Participant};
use crate::region;

/// Budget bounds, default, and the single relaxation step (minutes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub min: u32,
    pub max: u32,
    pub default: u32,
    pub increment: u32,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            min: 5,
            max: 60,
            default: 15,
            increment: 5,
        }
    }
}

impl BudgetPolicy {
    pub fn validate(&self, minutes: u32) -> Result<u32, InputError> {
        if (self.min..=self.max).contains(&minutes) {
            Ok(minutes)
        } else {
            Err(InputError::BudgetOutOfRange {
                min: self.min,
                max: self.max,
                got: minutes,
            })
        }
    }

    /// Next budget, if it stays within `max`.
    #[inline]
    pub fn relaxed(&self, minutes: u32) -> Option<u32> {
        minutes
            .checked_add(self.increment)
            .filter(|b| *b <= self.max && self.increment > 0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelaxState {
    Initial,
    Relaxed,
    Succeeded,
    Failed,
}

impl RelaxState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelaxState::Succeeded | RelaxState::Failed)
    }
}

/// Budget owner for one computation; records every state it passes through.
#[derive(Clone, Debug)]
pub struct Relaxation {
    policy: BudgetPolicy,
    budget: u32,
    state: RelaxState,
    history: Vec<RelaxState>,
}

impl Relaxation {
    pub fn new(requested: u32, policy: BudgetPolicy) -> Result<Self, InputError> {
        let budget = policy.validate(requested)?;
        Ok(Self {
            policy,
            budget,
            state: RelaxState::Initial,
            history: vec![RelaxState::Initial],
        })
    }

    /// Budget currently in effect (the last one tried once terminal).
    #[inline]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    #[inline]
    pub fn state(&self) -> RelaxState {
        self.state
    }

    /// States visited so far, starting with `Initial`.
    pub fn history(&self) -> &[RelaxState] {
        &self.history
    }

    /// Whether the budget was raised.
    pub fn relaxed(&self) -> bool {
        self.history.contains(&RelaxState::Relaxed)
    }

    /// Feed the intersection outcome at the current budget and advance.
    pub fn observe(&mut self, common_is_empty: bool) -> RelaxState {
        let next = match (self.state, common_is_empty) {
            (RelaxState::Initial | RelaxState::Relaxed, false) => RelaxState::Succeeded,
            (RelaxState::Initial, true) => match self.policy.relaxed(self.budget) {
                Some(b) => {
                    self.budget = b;
                    RelaxState::Relaxed
                }
                None => RelaxState::Failed,
            },
            (RelaxState::Relaxed, true) => RelaxState::Failed,
            (terminal, _) => terminal,
        };
        if next != self.state {
            self.history.push(next);
        }
        self.state = next;
        next
    }
}

/// Terminal result of the relaxation loop.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub relaxation: Relaxation,
    /// Common region at the effective budget (empty when `Failed`).
    pub common: Region,
    /// Participants with their regions at the effective budget.
    pub participants: Vec<Participant>,
}

impl Resolved {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.relaxation.state() == RelaxState::Succeeded
    }
}

/// Fetch, intersect, and relax at most once.
pub async fn resolve<P: IsochroneProvider + ?Sized>(
    provider: &P,
    origins: &[Origin],
    profile: Profile,
    mut relaxation: Relaxation,
    geom: &GeomCfg,
    call_timeout: Duration,
) -> PlanResult<Resolved> {
    loop {
        let minutes = relaxation.budget();
        let participants = fetch_participants(provider, origins, profile, minutes, geom, call_timeout).await?;
        let regions: Vec<Region> = participants.iter().map(|p| p.region.clone()).collect();
        let common = region::intersect(&regions, geom)?;
        let state = relaxation.observe(common.is_empty());
        debug!(minutes, ?state, "relaxation_step");
        match state {
            RelaxState::Succeeded => {
                return Ok(Resolved {
                    relaxation,
                    common,
                    participants,
                });
            }
            RelaxState::Failed => {
                info!(minutes, "no_common_reachable_region");
                return Ok(Resolved {
                    relaxation,
                    common: Region::Empty,
                    participants,
                });
            }
            RelaxState::Relaxed | RelaxState::Initial => {
                info!(from = minutes, to = relaxation.budget(), "budget_relaxed");
            }
        }
    }
}

/// One isochrone per origin, fetched concurrently; first failure aborts.
async fn fetch_participants<P: IsochroneProvider + ?Sized>(
    provider: &P,
    origins: &[Origin],
    profile: Profile,
    minutes: u32,
    geom: &GeomCfg,
    call_timeout: Duration,
) -> PlanResult<Vec<Participant>> {
    let fetches = origins.iter().map(|origin| async move {
        let call = provider.fetch(origin.coordinate, profile, minutes);
        let region = tokio::time::timeout(call_timeout, call)
            .await
            .unwrap_or(Err(ProviderError::Timeout))
            .map_err(|source| PlanError::Provider {
                participant: origin.address.clone(),
                phase: Phase::Isochrone { minutes },
                source,
            })?;
        ops::validate(&region, geom).map_err(|defect| InputError::InvalidRegion {
            participant: origin.address.clone(),
            defect,
        })?;
        Ok::<_, PlanError>(Participant {
            address: origin.address.clone(),
            coordinate: origin.coordinate,
            region,
        })
    });
    try_join_all(fetches).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_first_try_succeeds_without_relaxing() {
        let mut r = Relaxation::new(15, BudgetPolicy::default()).unwrap();
        assert_eq!(r.observe(false), RelaxState::Succeeded);
        assert_eq!(r.budget(), 15);
        assert!(!r.relaxed());
        assert_eq!(r.history(), &[RelaxState::Initial, RelaxState::Succeeded]);
    }

    #[test]
    fn relaxes_exactly_once() {
        let mut r = Relaxation::new(15, BudgetPolicy::default()).unwrap();
        assert!(!r.state().is_terminal());
        assert_eq!(r.observe(true), RelaxState::Relaxed);
        assert!(!r.state().is_terminal());
        assert_eq!(r.budget(), 20);
        assert_eq!(r.observe(true), RelaxState::Failed);
        assert!(r.state().is_terminal());
        assert_eq!(r.budget(), 20);
        // terminal states absorb further observations
        assert_eq!(r.observe(false), RelaxState::Failed);
        assert_eq!(
            r.history(),
            &[RelaxState::Initial, RelaxState::Relaxed, RelaxState::Failed]
        );
    }

    #[test]
    fn never_exceeds_max_budget() {
        let mut r = Relaxation::new(58, BudgetPolicy::default()).unwrap();
        assert_eq!(r.observe(true), RelaxState::Failed);
        assert_eq!(r.budget(), 58);
        // exactly at the bound is still allowed
        let mut r = Relaxation::new(55, BudgetPolicy::default()).unwrap();
        assert_eq!(r.observe(true), RelaxState::Relaxed);
        assert_eq!(r.budget(), 60);
    }

    #[test]
    fn rejects_out_of_range_budget() {
        let policy = BudgetPolicy::default();
        assert!(Relaxation::new(4, policy).is_err());
        assert!(Relaxation::new(61, policy).is_err());
        assert!(Relaxation::new(5, policy).is_ok());
        assert!(Relaxation::new(60, policy).is_ok());
    }
}
