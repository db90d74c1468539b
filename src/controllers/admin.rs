//! Back-office endpoints. Everything except `/is-admin` requires the admin role.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::controllers::ApiJson;
use crate::error::{AppError, AppResult};
use crate::middleware::{AdminUser, AuthUser};
use crate::models::user::ROLE_ADMIN;
use crate::services::reports;
use crate::store::{BookingStore, UserStore};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/is-admin", get(is_admin))
        .route("/dashboard", get(dashboard))
        .route("/shows", get(upcoming_shows))
        .route("/bookings", get(all_bookings))
        .route("/bookings/{id}/paid", patch(mark_paid))
        .route("/make-admin", post(make_admin))
        .route("/users", get(all_users))
}

// GET /api/admin/is-admin
async fn is_admin(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<Value>> {
    let user = state
        .store
        .user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(json!({ "success": true, "isAdmin": user.is_admin() })))
}

// GET /api/admin/dashboard
async fn dashboard(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let dashboard = reports::dashboard(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(json!({ "success": true, "dashboardData": dashboard })))
}

// GET /api/admin/shows
async fn upcoming_shows(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let shows = reports::upcoming_with_reports(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(json!({ "success": true, "shows": shows })))
}

// GET /api/admin/bookings
async fn all_bookings(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let bookings = state.store.all_bookings().await?;
    let bookings = reports::with_shows(state.store.as_ref(), bookings).await?;
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

// PATCH /api/admin/bookings/{id}/paid
async fn mark_paid(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let booking = state
        .store
        .mark_paid(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;
    info!("Booking {} marked paid by {}", id, admin.user.id);

    Ok(Json(json!({ "success": true, "message": "Booking marked as paid", "booking": booking })))
}

// POST /api/admin/make-admin
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeAdminRequest {
    pub user_id: String,
}

async fn make_admin(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ApiJson(req): ApiJson<MakeAdminRequest>,
) -> AppResult<Json<Value>> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::validation("User ID is required"));
    }

    let user = state
        .store
        .set_role(user_id, ROLE_ADMIN)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!("User {} promoted to admin by {}", user.id, admin.user.id);

    Ok(Json(json!({ "success": true, "message": "User role updated to admin", "user": user })))
}

// GET /api/admin/users
async fn all_users(State(state): State<Arc<AppState>>, _admin: AdminUser) -> AppResult<Json<Value>> {
    let users = state.store.all_users().await?;
    Ok(Json(json!({ "success": true, "users": users })))
}
