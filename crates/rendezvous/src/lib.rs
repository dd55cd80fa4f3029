//! Fair meeting-point planning.
//!
//! Given participants with origins, a travel profile and a time budget, find a
//! point every participant can reach within the budget and pick the best one
//! under a fairness objective.
//!
//! Pipeline
//! - `relax`: fetch reachability regions and intersect them (`region`),
//!   widening the budget once if nothing is common.
//! - `candidates`: grid points inside the common region plus an anchor.
//! - `select`: score candidates against a travel-time oracle and pick one.
//! - `plan`: request normalization and orchestration; `response`: JSON shape.
//!
//! External services sit behind the async traits in `collab`.

pub mod candidates;
pub mod collab;
pub mod error;
pub mod geom;
pub mod plan;
pub mod region;
pub mod relax;
pub mod response;
pub mod select;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{InputError, OracleError, PlanError, PlanResult, ProviderError};
pub use plan::{MeetingRequest, Outcome, PlanCfg, Planner};

/// Common exports for callers and tests.
pub mod prelude {
    pub use crate::collab::{
        CachedOracle, CachedProvider, DiscIsochrones, IsochroneProvider, LookupCache, Profile,
        StraightLineOracle, TravelTimeOracle,
    };
    pub use crate::error::{
        GeometryDefect, InputError, OracleError, Phase, PlanError, PlanResult, ProviderError,
    };
    pub use crate::geom::{Coordinate, GeomCfg, LocalFrame, Region};
    pub use crate::plan::{
        Meeting, MeetingRequest, Origin, Outcome, ParticipantInput, PlanCfg, Planner,
        SelectionKind, UnreachableReason,
    };
    pub use crate::relax::{BudgetPolicy, RelaxState, Relaxation};
    pub use crate::response::PlanResponse;
    pub use crate::select::{Objective, TimeMatrix};
}
