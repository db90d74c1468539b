use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::controllers::ApiJson;
use crate::error::{AppError, AppResult};
use crate::middleware::AdminUser;
use crate::models::{theater::DUPLICATE_THEATER, Theater, TheaterFilter, TheaterInput};
use crate::store::{ShowStore, TheaterStore};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/theaters", get(list_theaters).post(create_theater))
        .route(
            "/theaters/{id}",
            get(get_theater).put(update_theater).delete(delete_theater),
        )
        .route("/theaters/{id}/toggle", patch(toggle_theater))
}

async fn existing(state: &AppState, id: i64) -> AppResult<Theater> {
    state
        .store
        .theater(id)
        .await?
        .ok_or_else(|| AppError::not_found("Theater not found"))
}

// POST /api/admin/theaters
async fn create_theater(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ApiJson(input): ApiJson<TheaterInput>,
) -> AppResult<impl IntoResponse> {
    let input = input.normalised();
    input.validate()?;

    if state.store.find_theater(&input.name, &input.location).await?.is_some() {
        return Err(AppError::validation(DUPLICATE_THEATER));
    }

    let theater = state.store.create_theater(input).await?;
    info!("Theater {} ({}) created by {}", theater.id, theater.name, admin.user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Theater created successfully",
            "theater": theater
        })),
    ))
}

// GET /api/admin/theaters?page&limit&search&isActive
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheaterQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl TheaterQuery {
    fn filter(self) -> TheaterFilter {
        TheaterFilter {
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            is_active: self.is_active,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

async fn list_theaters(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(params): Query<TheaterQuery>,
) -> AppResult<Json<Value>> {
    let filter = params.filter();
    let page = state.store.list_theaters(&filter).await?;
    let total_pages = (page.total as u64).div_ceil(filter.limit as u64);

    Ok(Json(json!({
        "success": true,
        "theaters": page.theaters,
        "totalPages": total_pages,
        "currentPage": filter.page,
        "total": page.total
    })))
}

// GET /api/admin/theaters/{id}
async fn get_theater(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let theater = existing(&state, id).await?;
    Ok(Json(json!({ "success": true, "theater": theater })))
}

// PUT /api/admin/theaters/{id}
async fn update_theater(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<TheaterInput>,
) -> AppResult<Json<Value>> {
    let input = input.normalised();
    input.validate()?;

    let theater = state
        .store
        .update_theater(id, input)
        .await?
        .ok_or_else(|| AppError::not_found("Theater not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Theater updated successfully",
        "theater": theater
    })))
}

// DELETE /api/admin/theaters/{id}
async fn delete_theater(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let theater = existing(&state, id).await?;

    let upcoming = state
        .store
        .count_upcoming_at_theater(&theater.name, Utc::now())
        .await?;
    if upcoming > 0 {
        return Err(AppError::validation(
            "Cannot delete theater with active shows. Please cancel or move the shows first.",
        ));
    }

    if !state.store.delete_theater(id).await? {
        return Err(AppError::not_found("Theater not found"));
    }
    info!("Theater {} deleted by {}", id, admin.user.id);

    Ok(Json(json!({ "success": true, "message": "Theater deleted successfully" })))
}

// PATCH /api/admin/theaters/{id}/toggle
async fn toggle_theater(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let current = existing(&state, id).await?;
    let theater = state
        .store
        .set_theater_active(id, !current.is_active)
        .await?
        .ok_or_else(|| AppError::not_found("Theater not found"))?;

    let verb = if theater.is_active { "activated" } else { "deactivated" };
    Ok(Json(json!({
        "success": true,
        "message": format!("Theater {} successfully", verb),
        "theater": theater
    })))
}
