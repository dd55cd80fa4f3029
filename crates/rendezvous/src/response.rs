//! Wire format of plan results (JSON).
//!
//! - Times are reported in minutes: `eta_minutes` rounded to one decimal,
//!   `objective_value` rounded to two (and `null` for the centroid fallback).
//! - The optional debug payload carries the common region as a GeoJSON
//!   Polygon/MultiPolygon and the candidate set as a GeoJSON MultiPoint.
//! - Errors get their own envelope so that callers can tell bad input from
//!   upstream failures without parsing messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PlanError;
use crate::geom::{Coordinate, Region};
use crate::plan::{Meeting, Outcome, SelectionKind};
use crate::select::Objective;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinate> for LatLng {
    fn from(c: Coordinate) -> Self {
        Self {
            lat: c.lat,
            lng: c.lng,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReport {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub eta_minutes: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugPayload {
    pub intersection_polygons_geojson: Option<Value>,
    pub candidate_points_geojson: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeetingResponse {
    pub meeting_point: LatLng,
    pub participants: Vec<ParticipantReport>,
    pub objective: Objective,
    /// Minutes; `null` for the centroid fallback.
    pub objective_value: Option<f64>,
    pub selection: SelectionKind,
    pub max_minutes: u32,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnreachableResponse {
    pub reachable: bool,
    pub reason: String,
    pub max_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanResponse {
    Reachable(MeetingResponse),
    Unreachable(UnreachableResponse),
}

impl PlanResponse {
    pub fn from_outcome(outcome: &Outcome, include_debug: bool) -> Self {
        match outcome {
            Outcome::Reachable(m) => PlanResponse::Reachable(meeting_response(m, include_debug)),
            Outcome::Unreachable {
                reason,
                effective_budget,
            } => PlanResponse::Unreachable(UnreachableResponse {
                reachable: false,
                reason: reason.as_str().to_string(),
                max_minutes: *effective_budget,
            }),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, PlanResponse::Reachable(_))
    }
}

fn meeting_response(m: &Meeting, include_debug: bool) -> MeetingResponse {
    let participants = m
        .participants
        .iter()
        .map(|p| ParticipantReport {
            address: p.address.clone(),
            lat: p.coordinate.lat,
            lng: p.coordinate.lng,
            eta_minutes: round_to(p.seconds / 60.0, 1),
        })
        .collect();
    let debug = include_debug.then(|| DebugPayload {
        intersection_polygons_geojson: region_geojson(&m.common_region),
        candidate_points_geojson: m.candidates.as_deref().map(points_geojson),
    });
    MeetingResponse {
        meeting_point: m.meeting_point.into(),
        participants,
        objective: m.objective,
        objective_value: m.objective_value.map(|s| round_to(s / 60.0, 2)),
        selection: m.selection,
        max_minutes: m.effective_budget,
        reachable: true,
        debug,
    }
}

/// Error envelope: `kind` is `"input"` or `"upstream"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl From<&PlanError> for ErrorResponse {
    fn from(err: &PlanError) -> Self {
        let participant = match err {
            PlanError::Input(_) => None,
            PlanError::Provider { participant, .. } | PlanError::Oracle { participant, .. } => {
                Some(participant.clone())
            }
        };
        Self {
            kind: if err.is_upstream() { "upstream" } else { "input" }.to_string(),
            message: err.to_string(),
            participant,
            phase: err.phase().map(|p| p.to_string()),
        }
    }
}

/// Round half away from zero to `decimals` places.
#[inline]
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

fn ring_coords(ring: &geo::LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_coords(poly: &geo::Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(ring_coords)
        .collect()
}

/// GeoJSON geometry of a geographic region; `None` when empty.
pub fn region_geojson(region: &Region) -> Option<Value> {
    match region {
        Region::Empty => None,
        Region::Single(p) => Some(json!({
            "type": "Polygon",
            "coordinates": polygon_coords(p),
        })),
        Region::Multi(ps) => Some(json!({
            "type": "MultiPolygon",
            "coordinates": ps.iter().map(polygon_coords).collect::<Vec<_>>(),
        })),
    }
}

/// GeoJSON MultiPoint of `[lng, lat]` positions.
pub fn points_geojson(points: &[Coordinate]) -> Value {
    json!({
        "type": "MultiPoint",
        "coordinates": points.iter().map(|c| [c.lng, c.lat]).collect::<Vec<_>>(),
    })
}
