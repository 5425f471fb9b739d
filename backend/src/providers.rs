//! Boundary adapters for the external routing and geocoding collaborators.
//!
//! The rest of the crate only sees the `DirectionsProvider` and `Geocoder`
//! traits plus the normalized `RouteErrorKind` taxonomy; no raw provider
//! payload leaves this module.

use async_trait::async_trait;
use serde::Deserialize;

use sniffertrek_shared::{Coordinate, Leg, RouteErrorKind, TravelMode};

#[derive(Debug, Clone)]
pub struct DirectionsRequest {
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub mode: TravelMode,
    pub optimize: bool,
}

#[derive(Debug, Clone)]
pub struct DirectionsResponse {
    pub legs: Vec<Leg>,
    /// Permutation of the request's waypoint indices, present only when
    /// optimization was requested and the provider reordered them.
    pub waypoint_order: Option<Vec<usize>>,
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn directions(
        &self,
        req: DirectionsRequest,
    ) -> Result<DirectionsResponse, RouteErrorKind>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Coordinate, RouteErrorKind>;
}

/// Maps a Google-style status string onto the closed error taxonomy.
pub fn error_kind_from_status(status: &str) -> RouteErrorKind {
    match status {
        "NOT_FOUND" => RouteErrorKind::NotFound,
        "ZERO_RESULTS" => RouteErrorKind::ZeroResults,
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => RouteErrorKind::RateLimited,
        "REQUEST_DENIED" => RouteErrorKind::RequestDenied,
        "INVALID_REQUEST" => RouteErrorKind::InvalidRequest,
        "MAX_WAYPOINTS_EXCEEDED" => RouteErrorKind::WaypointLimitExceeded,
        _ => RouteErrorKind::Unknown,
    }
}

fn mode_param(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Driving => "driving",
        TravelMode::Walking => "walking",
        TravelMode::Bicycling => "bicycling",
    }
}

/// Google Maps web-service adapter for directions and geocoding.
pub struct GoogleMapsProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleMapsProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://maps.googleapis.com".to_string())
    }

    /// Base URL override for tests against a local stub server.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[derive(Deserialize)]
struct GoogleDirectionsBody {
    status: String,
    #[serde(default)]
    routes: Vec<GoogleRoute>,
}

#[derive(Deserialize)]
struct GoogleRoute {
    #[serde(default)]
    legs: Vec<GoogleLeg>,
    #[serde(default)]
    waypoint_order: Vec<usize>,
}

#[derive(Deserialize)]
struct GoogleLeg {
    start_address: String,
    end_address: String,
    distance: GoogleValue,
    duration: GoogleValue,
}

#[derive(Deserialize)]
struct GoogleValue {
    value: u32,
}

#[derive(Deserialize)]
struct GoogleGeocodeBody {
    status: String,
    #[serde(default)]
    results: Vec<GoogleGeocodeResult>,
}

#[derive(Deserialize)]
struct GoogleGeocodeResult {
    geometry: GoogleGeometry,
}

#[derive(Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

#[async_trait]
impl DirectionsProvider for GoogleMapsProvider {
    async fn directions(
        &self,
        req: DirectionsRequest,
    ) -> Result<DirectionsResponse, RouteErrorKind> {
        let waypoints = if req.optimize {
            format!("optimize:true|{}", req.waypoints.join("|"))
        } else {
            req.waypoints.join("|")
        };

        let mut query: Vec<(&str, &str)> = vec![
            ("origin", req.origin.as_str()),
            ("destination", req.destination.as_str()),
            ("mode", mode_param(req.mode)),
            ("key", self.api_key.as_str()),
        ];
        if !req.waypoints.is_empty() {
            query.push(("waypoints", waypoints.as_str()));
        }

        let url = format!("{}/maps/api/directions/json", self.base_url);
        let body: GoogleDirectionsBody = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(%err, "directions request failed to reach provider");
                RouteErrorKind::Unknown
            })?
            .json()
            .await
            .map_err(|err| {
                tracing::warn!(%err, "directions response was not valid JSON");
                RouteErrorKind::Unknown
            })?;

        if body.status != "OK" {
            return Err(error_kind_from_status(&body.status));
        }
        let route = body.routes.into_iter().next().ok_or(RouteErrorKind::ZeroResults)?;

        let legs = route
            .legs
            .into_iter()
            .map(|leg| Leg {
                origin: leg.start_address,
                destination: leg.end_address,
                distance_m: leg.distance.value,
                duration_s: leg.duration.value,
            })
            .collect();
        let waypoint_order = if req.optimize && !route.waypoint_order.is_empty() {
            Some(route.waypoint_order)
        } else {
            None
        };

        Ok(DirectionsResponse {
            legs,
            waypoint_order,
        })
    }
}

#[async_trait]
impl Geocoder for GoogleMapsProvider {
    async fn geocode(&self, query: &str) -> Result<Coordinate, RouteErrorKind> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let body: GoogleGeocodeBody = self
            .client
            .get(&url)
            .query(&[("address", query), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(%err, "geocode request failed to reach provider");
                RouteErrorKind::Unknown
            })?
            .json()
            .await
            .map_err(|err| {
                tracing::warn!(%err, "geocode response was not valid JSON");
                RouteErrorKind::Unknown
            })?;

        if body.status != "OK" {
            return Err(error_kind_from_status(&body.status));
        }
        body.results
            .into_iter()
            .next()
            .map(|result| Coordinate {
                lat: result.geometry.location.lat,
                lng: result.geometry.location.lng,
            })
            .ok_or(RouteErrorKind::ZeroResults)
    }
}
