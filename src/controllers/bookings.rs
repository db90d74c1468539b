use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::controllers::ApiJson;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::check_availability;
use crate::store::ShowStore;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_booking))
        .route("/seats/{show_id}", get(occupied_seats))
        .route("/check", post(check_seats))
}

// POST /api/booking/create
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub show_id: i64,
    #[serde(default)]
    pub booked_seats: Vec<String>,
    pub amount: Option<f64>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let amount = req
        .amount
        .ok_or_else(|| AppError::validation("Missing required fields"))?;

    let booking = state
        .reservations
        .commit_booking(req.show_id, &user.user_id, &req.booked_seats, amount)
        .await?;

    state.refresh_seats(booking.show_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Booked successfully",
            "booking": booking
        })),
    ))
}

// GET /api/booking/seats/{show_id}
async fn occupied_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> AppResult<Json<Value>> {
    if let Some(cache) = &state.cache {
        match cache.get_occupied_seats(show_id).await {
            Ok(Some(seats)) => return Ok(Json(json!({ "success": true, "occupiedSeats": seats }))),
            Ok(None) => {}
            Err(e) => warn!("seats cache read for show {} failed: {:?}", show_id, e),
        }
    }

    let show = state
        .store
        .show(show_id)
        .await?
        .ok_or_else(|| AppError::not_found("Show not found"))?;
    let seats = show.occupied_seats.labels();

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.cache_occupied_seats(show_id, &seats).await {
            warn!("seats cache write for show {} failed: {:?}", show_id, e);
        }
    }

    Ok(Json(json!({ "success": true, "occupiedSeats": seats })))
}

// POST /api/booking/check
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSeatsRequest {
    pub show_id: i64,
    #[serde(default)]
    pub seats: Vec<String>,
}

async fn check_seats(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CheckSeatsRequest>,
) -> Json<Value> {
    let available = check_availability(state.store.as_ref(), req.show_id, &req.seats).await;
    Json(json!({ "success": true, "available": available }))
}
