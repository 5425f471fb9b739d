use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// Opaque stop identity, assigned once by the plan and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopRole {
    Start,
    Waypoint,
    End,
}

/// Hotel booking attached to an overnight stop. Every field is independently
/// optional; a present `confirmation` marks the stage as booked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nights: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.confirmation.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub role: StopRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
    #[serde(default)]
    pub overnight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
}

impl Stop {
    /// A stop takes part in routing once the user has given it a name.
    pub fn is_resolved(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
}

/// One provider-computed travel segment between two consecutive stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub origin: String,
    pub destination: String,
    pub distance_m: u32,
    pub duration_s: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHotel {
    pub booked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A contiguous run of legs ending at an overnight stop (or at the route end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub index: usize,
    pub label: String,
    pub origin: String,
    pub destination: String,
    pub legs: Vec<Leg>,
    pub distance_km: u32,
    pub duration_s: u32,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel: Option<StageHotel>,
}

/// Normalized routing/geocoding failure taxonomy. Provider-specific status
/// codes are mapped onto this closed set at the boundary adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RouteErrorKind {
    #[error("no route found between the given stops")]
    NotFound,
    #[error("a stop could not be resolved to a location")]
    ZeroResults,
    #[error("routing provider rate limit reached")]
    RateLimited,
    #[error("routing provider rejected the request (check API credentials)")]
    RequestDenied,
    #[error("invalid routing request")]
    InvalidRequest,
    #[error("too many waypoints for a single routing request")]
    WaypointLimitExceeded,
    #[error("unknown routing provider error")]
    Unknown,
}

/// The computed route as served to clients: legs, totals and stages, or the
/// last normalized error. Stale or failed computations never overwrite the
/// previously displayed legs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteView {
    pub legs: Vec<Leg>,
    pub total_distance_m: u64,
    pub total_duration_s: u64,
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RouteErrorKind>,
}

/// A whole-trip snapshot as persisted: round-trips the full stop list,
/// coordinates and bookings losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub name: String,
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub mode: TravelMode,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: i64,
    #[serde(flatten)]
    pub snapshot: TripSnapshot,
}

/// A point of interest proposed by the recommendation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSuggestion {
    pub name: String,
    pub description: String,
    pub category: String,
    pub detour_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
    pub stage_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
