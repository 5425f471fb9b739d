//! Handlers for the saved-trips API: whole-route snapshots plus the
//! currently-active-trip pointer.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use sniffertrek_shared::{ApiError, TripRecord, TripSnapshot};

use crate::plan::TripPlan;
use crate::store::StoreError;
use crate::{AppState, schedule_recompute};

/// POST /api/trips - snapshot the active plan under a name
#[derive(Debug, Deserialize)]
pub struct SaveTripRequest {
    pub name: String,
}

pub async fn save_trip(
    State(state): State<AppState>,
    Json(req): Json<SaveTripRequest>,
) -> Result<Json<TripRecord>, (StatusCode, Json<ApiError>)> {
    let snapshot = {
        let session = state.session.plan.lock().await;
        TripSnapshot {
            name: req.name,
            stops: session.plan.stops().to_vec(),
            mode: session.mode,
            updated_at: Utc::now(),
        }
    };
    state
        .session
        .store
        .create(snapshot)
        .await
        .map(Json)
        .map_err(store_error_to_api_error)
}

/// GET /api/trips - list all saved trips
pub async fn list_trips(
    State(state): State<AppState>,
) -> Result<Json<Vec<TripRecord>>, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .list()
        .await
        .map(Json)
        .map_err(store_error_to_api_error)
}

/// GET /api/trips/{id}
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TripRecord>, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .get(id)
        .await
        .map(Json)
        .map_err(store_error_to_api_error)
}

/// PUT /api/trips/{id} - full-snapshot update, merged last-write-wins
pub async fn update_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(snapshot): Json<TripSnapshot>,
) -> Result<Json<TripRecord>, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .update(id, snapshot)
        .await
        .map(Json)
        .map_err(store_error_to_api_error)
}

/// DELETE /api/trips/{id}
pub async fn delete_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .delete(id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error_to_api_error)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveTrip {
    pub trip_id: Option<i64>,
}

/// GET /api/trips/active
pub async fn get_active_trip(
    State(state): State<AppState>,
) -> Result<Json<ActiveTrip>, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .active_trip()
        .await
        .map(|trip_id| Json(ActiveTrip { trip_id }))
        .map_err(store_error_to_api_error)
}

/// PUT /api/trips/active - switch trips; loading the snapshot replaces the
/// active plan and kicks off a recompute
pub async fn set_active_trip(
    State(state): State<AppState>,
    Json(req): Json<ActiveTrip>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state
        .session
        .store
        .set_active_trip(req.trip_id)
        .await
        .map_err(store_error_to_api_error)?;

    if let Some(id) = req.trip_id {
        let record = state
            .session
            .store
            .get(id)
            .await
            .map_err(store_error_to_api_error)?;
        {
            let mut session = state.session.plan.lock().await;
            session.plan = TripPlan::from_stops(record.snapshot.stops);
            session.mode = record.snapshot.mode;
        }
        schedule_recompute(&state);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn store_error_to_api_error(err: StoreError) -> (StatusCode, Json<ApiError>) {
    let (status, message) = match err {
        StoreError::NotFound(id) => (StatusCode::NOT_FOUND, format!("trip {id} not found")),
        StoreError::InvalidData(msg) => (StatusCode::BAD_REQUEST, msg),
        StoreError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        StoreError::Connection(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("store connection error: {e}"),
        ),
    };
    (status, Json(ApiError { message }))
}
