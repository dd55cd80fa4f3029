//! Error taxonomy for the planner.
//!
//! Infeasibility (`no_common_reachable_region`) is not an error; it is an
//! `Outcome`. Errors are either bad input, detected before any oracle call, or
//! upstream failures of the isochrone provider / travel-time oracle, tagged
//! with the participant and phase in which they occurred.

use std::fmt;

use thiserror::Error;

/// Result type for planner operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Structural defect of an input polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryDefect {
    #[error("ring has fewer than 3 distinct vertices")]
    TooFewVertices,
    #[error("ring contains non-finite coordinates")]
    NonFinite,
    #[error("component has zero area")]
    ZeroArea,
    #[error("ring is self-intersecting")]
    SelfIntersecting,
}

/// Malformed or out-of-range input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("no participants supplied")]
    NoParticipants,
    #[error("at most {max} participants are supported, got {got}")]
    TooManyParticipants { max: usize, got: usize },
    #[error("max_minutes must be within [{min}, {max}], got {got}")]
    BudgetOutOfRange { min: u32, max: u32, got: u32 },
    #[error("invalid coordinate for '{participant}': ({lng}, {lat})")]
    InvalidCoordinate {
        participant: String,
        lng: f64,
        lat: f64,
    },
    #[error("grid spacing must be a positive finite number of meters, got {0}")]
    InvalidGridSpacing(f64),
    #[error("grid spacing must be at least {min} m, got {got}")]
    GridSpacingTooFine { min: f64, got: f64 },
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("no regions to intersect")]
    NoRegions,
    #[error("invalid reachability region for '{participant}': {defect}")]
    InvalidRegion {
        participant: String,
        defect: GeometryDefect,
    },
    #[error("unknown profile '{0}' (expected walking or driving)")]
    UnknownProfile(String),
    #[error("unknown objective '{0}' (expected min_sum or min_max)")]
    UnknownObjective(String),
}

/// Failure reported by an isochrone provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("credentials rejected")]
    Unauthorized,
    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },
    #[error("upstream service error (HTTP {status})")]
    Upstream { status: u16 },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure reported by a travel-time oracle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("credentials rejected")]
    Unauthorized,
    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },
    #[error("upstream service error (HTTP {status})")]
    Upstream { status: u16 },
    #[error("no route between origin and destination")]
    NoRoute,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Pipeline phase in which an upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Isochrone { minutes: u32 },
    Scoring,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Isochrone { minutes } => write!(f, "isochrone@{minutes}min"),
            Phase::Scoring => f.write_str("scoring"),
        }
    }
}

/// Error returned by the planner.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("isochrone provider failed for '{participant}' during {phase}: {source}")]
    Provider {
        participant: String,
        phase: Phase,
        #[source]
        source: ProviderError,
    },
    #[error("travel-time oracle failed for '{participant}' during {phase}: {source}")]
    Oracle {
        participant: String,
        phase: Phase,
        #[source]
        source: OracleError,
    },
}

impl PlanError {
    /// True for provider/oracle failures (as opposed to bad input).
    pub fn is_upstream(&self) -> bool {
        matches!(self, PlanError::Provider { .. } | PlanError::Oracle { .. })
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            PlanError::Input(_) => None,
            PlanError::Provider { phase, .. } | PlanError::Oracle { phase, .. } => Some(*phase),
        }
    }
}
