use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::Vector2;
use parking_lot::Mutex;

use rendezvous::collab::offline::Speeds;
use rendezvous::prelude::*;
use rendezvous::response::ErrorResponse;

/// Provider wrapper recording every `(origin, minutes)` request.
struct Recording<P> {
    inner: P,
    requests: Mutex<Vec<(Coordinate, u32)>>,
}

impl<P> Recording<P> {
    fn new(inner: P) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn minutes(&self) -> Vec<u32> {
        self.requests.lock().iter().map(|r| r.1).collect()
    }
}

#[async_trait]
impl<P: IsochroneProvider> IsochroneProvider for Recording<P> {
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError> {
        self.requests.lock().push((origin, minutes));
        self.inner.fetch(origin, profile, minutes).await
    }
}

/// Oracle wrapper counting calls and optionally failing from call `fail_from` on.
struct Flaky<O> {
    inner: O,
    calls: AtomicUsize,
    fail_from: Option<usize>,
}

impl<O> Flaky<O> {
    fn new(inner: O, fail_from: Option<usize>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_from,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<O: TravelTimeOracle> TravelTimeOracle for Flaky<O> {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|k| n >= k) {
            return Err(OracleError::RateLimited);
        }
        self.inner.travel_time(origin, destination, profile).await
    }
}

/// Walking speed such that `minutes` of walking covers `meters`.
fn speeds(meters: f64, minutes: f64) -> Speeds {
    Speeds {
        walking: meters / (minutes * 60.0),
        ..Speeds::default()
    }
}

fn discs(speeds: Speeds) -> DiscIsochrones {
    DiscIsochrones {
        speeds,
        ..Default::default()
    }
}

fn line(speeds: Speeds) -> StraightLineOracle {
    StraightLineOracle {
        speeds,
        detour: 1.0,
    }
}

const HOME: Coordinate = Coordinate::new(13.4050, 52.5200);

/// Point `dx_m` meters east of `HOME`.
fn east_of_home(dx_m: f64) -> Coordinate {
    LocalFrame::centered_on(HOME).inverse(Vector2::new(dx_m, 0.0))
}

fn request(points: &[(&str, Coordinate)], max_minutes: u32, objective: &str) -> MeetingRequest {
    MeetingRequest {
        participants: points
            .iter()
            .map(|(name, c)| ParticipantInput {
                address: name.to_string(),
                lat: c.lat,
                lng: c.lng,
            })
            .collect(),
        profile: "walking".into(),
        max_minutes: Some(max_minutes),
        objective: objective.into(),
        grid_resolution_m: Some(50.0),
    }
}

#[tokio::test]
async fn lens_between_two_walkers_is_reachable() {
    // 1 km discs, 1 km apart; oracle time = distance × 0.9 s/m
    let s = speeds(1_000.0, 15.0);
    let b = east_of_home(1_000.0);
    let planner = Planner::new(discs(s), line(s), PlanCfg::default());
    let outcome = planner
        .plan(&request(&[("A", HOME), ("B", b)], 15, "min_max"))
        .await
        .unwrap();

    let meeting = outcome.meeting().expect("reachable");
    assert_eq!(meeting.effective_budget, 15);
    assert!(!meeting.relaxed);
    assert_eq!(meeting.selection, SelectionKind::Optimized);
    let p = meeting.meeting_point;
    assert!(p.haversine_m(&HOME) <= 1_000.0 + 1e-3);
    assert!(p.haversine_m(&b) <= 1_000.0 + 1e-3);
    // fair point sits near the middle; 50 m grid leaves some slack
    assert!(meeting.objective_value.unwrap() <= 0.9 * 550.0);

    let v = serde_json::to_value(PlanResponse::from_outcome(&outcome, true)).unwrap();
    assert_eq!(v["reachable"], true);
    for person in v["participants"].as_array().unwrap() {
        assert!(person["eta_minutes"].as_f64().unwrap() <= 15.0);
    }
    assert_eq!(v["debug"]["intersection_polygons_geojson"]["type"], "Polygon");
}

#[tokio::test]
async fn far_apart_walkers_fail_after_one_relaxation() {
    let provider = Recording::new(DiscIsochrones::default());
    let oracle = Flaky::new(StraightLineOracle::default(), None);
    let planner = Planner::new(provider, oracle, PlanCfg::default());
    let far = east_of_home(50_000.0);
    let outcome = planner
        .plan(&request(&[("A", HOME), ("B", far)], 15, "min_sum"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Unreachable {
            reason: UnreachableReason::NoCommonReachableRegion,
            effective_budget: 20,
        }
    );
    let mut minutes = planner.provider().minutes();
    minutes.sort_unstable();
    assert_eq!(minutes, [15, 15, 20, 20]);
    assert_eq!(planner.oracle().calls(), 0);

    let v = serde_json::to_value(PlanResponse::from_outcome(&outcome, true)).unwrap();
    assert_eq!(v["reachable"], false);
    assert_eq!(v["reason"], "no_common_reachable_region");
    assert_eq!(v["max_minutes"], 20);
}

#[tokio::test]
async fn empty_at_first_budget_succeeds_after_relaxing() {
    // 0.5 m/s: 450 m discs at 15 min (disjoint), 600 m at 20 min (overlap)
    let s = Speeds {
        walking: 0.5,
        ..Speeds::default()
    };
    let planner = Planner::new(Recording::new(discs(s)), line(s), PlanCfg::default());
    let b = east_of_home(1_000.0);
    let outcome = planner
        .plan(&request(&[("A", HOME), ("B", b)], 15, "min_sum"))
        .await
        .unwrap();
    let meeting = outcome.meeting().expect("reachable after relaxing");
    assert_eq!(meeting.effective_budget, 20);
    assert!(meeting.relaxed);
    for eta in &meeting.participants {
        assert!(eta.seconds <= 20.0 * 60.0);
    }
    let requests = planner.provider().requests.lock().clone();
    assert_eq!(requests.len(), 4);
    for origin in [HOME, b] {
        assert_eq!(requests.iter().filter(|r| r.0 == origin).count(), 2);
    }
}

#[tokio::test]
async fn relaxation_never_exceeds_sixty_minutes() {
    let planner = Planner::new(
        Recording::new(DiscIsochrones::default()),
        StraightLineOracle::default(),
        PlanCfg::default(),
    );
    let far = east_of_home(50_000.0);
    let outcome = planner
        .plan(&request(&[("A", HOME), ("B", far)], 58, "min_sum"))
        .await
        .unwrap();
    assert_eq!(outcome.effective_budget(), 58);
    assert!(outcome.meeting().is_none());
    assert_eq!(planner.provider().minutes(), [58, 58]);
}

#[tokio::test]
async fn oracle_rate_limit_is_an_upstream_error() {
    let s = speeds(1_000.0, 15.0);
    let planner = Planner::new(discs(s), Flaky::new(line(s), Some(5)), PlanCfg::default());
    let b = east_of_home(1_000.0);
    let err = planner
        .plan(&request(&[("A", HOME), ("B", b)], 15, "min_sum"))
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(err.phase(), Some(Phase::Scoring));
    assert!(matches!(
        err,
        PlanError::Oracle {
            source: OracleError::RateLimited,
            ..
        }
    ));
    let envelope = ErrorResponse::from(&err);
    assert_eq!(envelope.kind, "upstream");
}

struct Refusing;

#[async_trait]
impl IsochroneProvider for Refusing {
    async fn fetch(&self, _: Coordinate, _: Profile, _: u32) -> Result<Region, ProviderError> {
        Err(ProviderError::Unauthorized)
    }
}

#[tokio::test]
async fn provider_failure_carries_participant_and_phase() {
    let planner = Planner::new(Refusing, StraightLineOracle::default(), PlanCfg::default());
    let err = planner
        .plan(&request(&[("A", HOME)], 25, "min_sum"))
        .await
        .unwrap_err();
    match err {
        PlanError::Provider {
            participant,
            phase,
            source,
        } => {
            assert_eq!(participant, "A");
            assert_eq!(phase, Phase::Isochrone { minutes: 25 });
            assert_eq!(source, ProviderError::Unauthorized);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Provider that never answers within any reasonable deadline.
struct Stalled;

#[async_trait]
impl IsochroneProvider for Stalled {
    async fn fetch(&self, _: Coordinate, _: Profile, _: u32) -> Result<Region, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Region::Empty)
    }
}

#[tokio::test]
async fn provider_timeout_is_upstream_not_unreachable() {
    let cfg = PlanCfg {
        call_timeout: Duration::from_millis(20),
        ..PlanCfg::default()
    };
    let planner = Planner::new(Stalled, Flaky::new(StraightLineOracle::default(), None), cfg);
    assert_eq!(planner.cfg().call_timeout, Duration::from_millis(20));
    let err = planner
        .plan(&request(&[("A", HOME), ("B", east_of_home(500.0))], 15, "min_sum"))
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(matches!(
        err,
        PlanError::Provider {
            source: ProviderError::Timeout,
            phase: Phase::Isochrone { minutes: 15 },
            ..
        }
    ));
    assert_eq!(ErrorResponse::from(&err).kind, "upstream");
    assert_eq!(planner.oracle().calls(), 0);
}

struct Bowtie;

#[async_trait]
impl IsochroneProvider for Bowtie {
    async fn fetch(&self, o: Coordinate, _: Profile, _: u32) -> Result<Region, ProviderError> {
        Ok(Region::from_ring(&[
            o,
            Coordinate::new(o.lng + 0.01, o.lat + 0.01),
            Coordinate::new(o.lng + 0.01, o.lat),
            Coordinate::new(o.lng, o.lat + 0.01),
        ]))
    }
}

#[tokio::test]
async fn self_intersecting_region_fails_before_scoring() {
    let planner = Planner::new(
        Bowtie,
        Flaky::new(StraightLineOracle::default(), None),
        PlanCfg::default(),
    );
    let err = planner
        .plan(&request(&[("A", HOME)], 15, "min_sum"))
        .await
        .unwrap_err();
    assert!(!err.is_upstream());
    assert!(matches!(
        err,
        PlanError::Input(InputError::InvalidRegion {
            defect: GeometryDefect::SelfIntersecting,
            ..
        })
    ));
    assert_eq!(planner.oracle().calls(), 0);
}

#[tokio::test]
async fn bad_request_fails_before_any_provider_call() {
    let planner = Planner::new(
        Recording::new(DiscIsochrones::default()),
        StraightLineOracle::default(),
        PlanCfg::default(),
    );
    let err = planner
        .plan(&request(&[("A", HOME)], 90, "min_sum"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Input(InputError::BudgetOutOfRange { got: 90, .. })
    ));
    assert!(planner.provider().minutes().is_empty());
}

/// Straight-line oracle slowed down by a constant factor.
struct Slow(StraightLineOracle, f64);

#[async_trait]
impl TravelTimeOracle for Slow {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        Ok(self.0.travel_time(origin, destination, profile).await? * self.1)
    }
}

#[tokio::test]
async fn over_budget_candidates_fall_back_to_anchor() {
    let s = speeds(1_000.0, 15.0);
    let planner = Planner::new(discs(s), Slow(line(s), 100.0), PlanCfg::default());
    let b = east_of_home(1_000.0);
    let outcome = planner
        .plan(&request(&[("A", HOME), ("B", b)], 15, "min_max"))
        .await
        .unwrap();
    let meeting = outcome.meeting().expect("fallback is still a meeting");
    assert_eq!(meeting.selection, SelectionKind::CentroidFallback);
    assert_eq!(meeting.objective_value, None);
    // lens centroid is the midpoint
    let mid = east_of_home(500.0);
    assert!(meeting.meeting_point.haversine_m(&mid) < 1.0);
    let anchor = *meeting.candidates.as_ref().unwrap().last().unwrap();
    assert_eq!(meeting.meeting_point, anchor);

    let v = serde_json::to_value(PlanResponse::from_outcome(&outcome, false)).unwrap();
    assert!(v["objective_value"].is_null());
    assert_eq!(v["selection"], "centroid_fallback");
}

#[tokio::test]
async fn shared_caches_serve_a_repeated_plan() {
    let s = speeds(1_000.0, 15.0);
    let regions = Arc::new(LookupCache::with_capacity(64));
    let times = Arc::new(LookupCache::with_capacity(4_096));
    let b = east_of_home(1_000.0);
    let req = request(&[("A", HOME), ("B", b)], 15, "min_sum");

    let first = Planner::new(
        CachedProvider::new(discs(s), regions.clone()),
        CachedOracle::new(Flaky::new(line(s), None), times.clone()),
        PlanCfg::default(),
    );
    let a = first.plan(&req).await.unwrap();

    // Second planner fails on any uncached oracle call.
    let second = Planner::new(
        CachedProvider::new(Refusing, regions.clone()),
        CachedOracle::new(Flaky::new(line(s), Some(0)), times.clone()),
        PlanCfg::default(),
    );
    let b = second.plan(&req).await.unwrap();
    assert_eq!(a, b);
    assert!(regions.stats().hits >= 2);
    assert!(times.stats().hits > 0);
}

#[tokio::test]
async fn outcome_is_deterministic() {
    let s = speeds(1_000.0, 15.0);
    let b = east_of_home(800.0);
    let req = request(&[("A", HOME), ("B", b)], 15, "min_sum");
    let mut seen = Vec::new();
    for concurrency in [1, 3, 16] {
        let cfg = PlanCfg {
            oracle_concurrency: concurrency,
            ..PlanCfg::default()
        };
        let planner = Planner::new(discs(s), line(s), cfg);
        seen.push(planner.plan(&req).await.unwrap());
    }
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[1], seen[2]);
}
