pub mod geo;
pub mod handlers;
pub mod insertion;
pub mod plan;
pub mod providers;
pub mod segmentation;
pub mod stages;
pub mod store;
pub mod suggestions;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use sniffertrek_shared::{
    ApiError, Booking, Coordinate, PoiSuggestion, RouteView, Stop, StopId, TravelMode,
};

use crate::insertion::Candidate;
use crate::plan::{PlanError, TripPlan};
use crate::providers::{DirectionsProvider, Geocoder};
use crate::segmentation::RouteComputer;
use crate::stages::build_stages;
use crate::store::TripStore;
use crate::suggestions::SuggestionProvider;

/// The single active planning session: one canonical stop list, one debounced
/// route computer, and the injected collaborators.
pub struct Session {
    pub plan: Mutex<PlanSession>,
    pub computer: RouteComputer,
    pub geocoder: Arc<dyn Geocoder>,
    pub suggestions: Arc<dyn SuggestionProvider>,
    pub store: Arc<dyn TripStore>,
}

pub struct PlanSession {
    pub plan: TripPlan,
    pub mode: TravelMode,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

impl AppState {
    pub fn new(
        directions: Arc<dyn DirectionsProvider>,
        geocoder: Arc<dyn Geocoder>,
        suggestions: Arc<dyn SuggestionProvider>,
        store: Arc<dyn TripStore>,
        waypoint_ceiling: usize,
        debounce: Duration,
    ) -> Self {
        Self {
            session: Arc::new(Session {
                plan: Mutex::new(PlanSession {
                    plan: TripPlan::new("", ""),
                    mode: TravelMode::default(),
                }),
                computer: RouteComputer::new(directions, waypoint_ceiling, debounce),
                geocoder,
                suggestions,
                store,
            }),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/plan", get(plan_view))
        .route("/api/plan/mode", put(set_mode))
        .route("/api/plan/route", get(route_view))
        .route("/api/plan/stops", post(add_stop))
        .route("/api/plan/stops/:id", axum::routing::delete(remove_stop))
        .route("/api/plan/stops/:id/name", put(rename_stop))
        .route("/api/plan/stops/:id/move", post(move_stop))
        .route("/api/plan/stops/:id/overnight", post(toggle_overnight))
        .route(
            "/api/plan/stops/:id/booking",
            put(set_booking).delete(clear_booking),
        )
        .route("/api/plan/reverse", post(reverse_plan))
        .route("/api/plan/optimize", post(optimize_plan))
        .route("/api/suggestions", post(suggest_pois))
        .route("/api/trips", post(handlers::save_trip).get(handlers::list_trips))
        .route(
            "/api/trips/active",
            get(handlers::get_active_trip).put(handlers::set_active_trip),
        )
        .route(
            "/api/trips/:id",
            get(handlers::get_trip)
                .put(handlers::update_trip)
                .delete(handlers::delete_trip),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Fires a debounced recomputation against a snapshot of the current stop
/// list. Called after every plan mutation; the computer's generation counter
/// makes the latest caller win.
pub(crate) fn schedule_recompute(state: &AppState) {
    let session = state.session.clone();
    tokio::spawn(async move {
        let (stops, mode) = {
            let guard = session.plan.lock().await;
            (guard.plan.stops().to_vec(), guard.mode)
        };
        session.computer.recompute(stops, mode, false).await;
    });
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanView {
    pub stops: Vec<Stop>,
    pub mode: TravelMode,
}

async fn plan_view(State(state): State<AppState>) -> Json<PlanView> {
    let session = state.session.plan.lock().await;
    Json(PlanView {
        stops: session.plan.stops().to_vec(),
        mode: session.mode,
    })
}

#[derive(Debug, Deserialize)]
struct SetModeRequest {
    mode: TravelMode,
}

async fn set_mode(
    State(state): State<AppState>,
    Json(req): Json<SetModeRequest>,
) -> Json<PlanView> {
    let view = {
        let mut session = state.session.plan.lock().await;
        session.mode = req.mode;
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Json(view)
}

/// The computed route is always served from the last successful computation;
/// stages are derived on read from those legs plus the current stop flags.
async fn route_view(State(state): State<AppState>) -> Json<RouteView> {
    let route = state.session.computer.state().await;
    let session = state.session.plan.lock().await;
    let stops = session.plan.stops();
    let stages = build_stages(
        &route.legs,
        stops,
        &session.plan.start().name,
        &session.plan.end().name,
    );
    Json(RouteView {
        legs: route.legs,
        total_distance_m: route.total_distance_m,
        total_duration_s: route.total_duration_s,
        stages,
        error: route.error,
    })
}

#[derive(Debug, Deserialize)]
pub struct AddStopRequest {
    /// Absent name adds a blank waypoint the user will fill in.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
    /// Explicit position (map click); otherwise nearest insertion decides.
    #[serde(default)]
    pub index: Option<usize>,
}

async fn add_stop(
    State(state): State<AppState>,
    Json(req): Json<AddStopRequest>,
) -> Json<PlanView> {
    let view = {
        let mut session = state.session.plan.lock().await;
        match req.name {
            None => {
                session.plan.add_blank_waypoint();
            }
            Some(name) => match req.index {
                Some(index) => {
                    session.plan.insert_waypoint_at(index, name, req.coordinates);
                }
                None => {
                    let candidate = Candidate {
                        name: name.clone(),
                        coordinates: req.coordinates,
                    };
                    let index = insertion::placement_index(
                        state.session.geocoder.as_ref(),
                        session.plan.stops_mut(),
                        &candidate,
                    )
                    .await;
                    session.plan.insert_waypoint_at(index, name, req.coordinates);
                }
            },
        }
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Json(view)
}

async fn remove_stop(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let view = {
        let mut session = state.session.plan.lock().await;
        session
            .plan
            .remove_waypoint(StopId(id))
            .map_err(plan_error_to_api_error)?;
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
}

/// Renaming can relocate: once the stop has enough resolved neighbors, the
/// edited stop is re-placed as if it had just been inserted, because its new
/// real-world location may make the old slot a detour.
async fn rename_stop(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let id = StopId(id);
    let view = {
        let mut session = state.session.plan.lock().await;
        session
            .plan
            .rename_stop(id, req.name.clone())
            .map_err(plan_error_to_api_error)?;

        if session.plan.is_relocatable(id) {
            let mut stop = session
                .plan
                .take_waypoint(id)
                .map_err(plan_error_to_api_error)?;
            if stop.coordinates.is_none() {
                stop.coordinates = state.session.geocoder.geocode(&stop.name).await.ok();
            }
            let candidate = Candidate {
                name: stop.name.clone(),
                coordinates: stop.coordinates,
            };
            let index = insertion::placement_index(
                state.session.geocoder.as_ref(),
                session.plan.stops_mut(),
                &candidate,
            )
            .await;
            session.plan.insert_stop_at(index, stop);
        }
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    direction: MoveDirection,
}

async fn move_stop(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let view = {
        let mut session = state.session.plan.lock().await;
        let moved = match req.direction {
            MoveDirection::Up => session.plan.move_up(StopId(id)),
            MoveDirection::Down => session.plan.move_down(StopId(id)),
        }
        .map_err(plan_error_to_api_error)?;
        if !moved {
            tracing::debug!(id, "move was a no-op at the list edge");
        }
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Ok(Json(view))
}

async fn toggle_overnight(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let view = {
        let mut session = state.session.plan.lock().await;
        session
            .plan
            .toggle_overnight(StopId(id))
            .map_err(plan_error_to_api_error)?;
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Ok(Json(view))
}

async fn set_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(booking): Json<Booking>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let mut session = state.session.plan.lock().await;
    session
        .plan
        .set_booking(StopId(id), booking)
        .map_err(plan_error_to_api_error)?;
    Ok(Json(PlanView {
        stops: session.plan.stops().to_vec(),
        mode: session.mode,
    }))
}

async fn clear_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let mut session = state.session.plan.lock().await;
    session
        .plan
        .clear_booking(StopId(id))
        .map_err(plan_error_to_api_error)?;
    Ok(Json(PlanView {
        stops: session.plan.stops().to_vec(),
        mode: session.mode,
    }))
}

async fn reverse_plan(State(state): State<AppState>) -> Json<PlanView> {
    let view = {
        let mut session = state.session.plan.lock().await;
        session.plan.reverse();
        PlanView {
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
        }
    };
    schedule_recompute(&state);
    Json(view)
}

/// One-shot provider-side waypoint reordering. The computer never applies
/// the permutation itself; it comes back here and goes through the plan's
/// single update path.
async fn optimize_plan(
    State(state): State<AppState>,
) -> Result<Json<PlanView>, (StatusCode, Json<ApiError>)> {
    let (stops, mode) = {
        let session = state.session.plan.lock().await;
        (session.plan.stops().to_vec(), session.mode)
    };
    let reordered = state.session.computer.recompute(stops, mode, true).await;

    let mut session = state.session.plan.lock().await;
    if let Some(order) = reordered {
        session
            .plan
            .apply_order(&order)
            .map_err(plan_error_to_api_error)?;
    }
    Ok(Json(PlanView {
        stops: session.plan.stops().to_vec(),
        mode: session.mode,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub stage_index: Option<usize>,
}

async fn suggest_pois(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<Vec<PoiSuggestion>>, (StatusCode, Json<ApiError>)> {
    let route = state.session.computer.state().await;
    let request = {
        let session = state.session.plan.lock().await;
        let stages = build_stages(
            &route.legs,
            session.plan.stops(),
            &session.plan.start().name,
            &session.plan.end().name,
        );
        suggestions::build_request(&stages, session.plan.stops(), req.interests, req.stage_index)
    };

    state
        .session
        .suggestions
        .suggest(&request)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::warn!(%err, "suggestion request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError {
                    message: err.to_string(),
                }),
            )
        })
}

fn plan_error_to_api_error(err: PlanError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        PlanError::UnknownStop(_) => StatusCode::NOT_FOUND,
        PlanError::SentinelRemoval => StatusCode::BAD_REQUEST,
        PlanError::OrderMismatch => StatusCode::CONFLICT,
    };
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
