use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::controllers::ApiJson;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::user::{UserProfile, ROLE_ADMIN, ROLE_USER};
use crate::services::reports;
use crate::store::{BookingStore, MovieStore, UserStore};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-or-update", post(create_or_update))
        .route("/bookings", get(user_bookings))
        .route("/update-favorite", post(toggle_favorite))
        .route("/favorites", get(favorites))
        .route("/favorites/{movie_id}", post(add_favorite).delete(remove_favorite))
}

// POST /api/user/create-or-update
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub image: Option<String>,
}

async fn create_or_update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> AppResult<Json<Value>> {
    req.validate()?;

    let initial_role = if state.config.admin.bootstrap_admins.contains(&auth.user_id) {
        ROLE_ADMIN
    } else {
        ROLE_USER
    };
    let user = state
        .store
        .upsert_user(UserProfile {
            id: auth.user_id,
            name: req.name.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            image: req.image.filter(|i| !i.trim().is_empty()),
            initial_role,
        })
        .await?;

    Ok(Json(json!({ "success": true, "user": user })))
}

// GET /api/user/bookings
async fn user_bookings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    let bookings = state.store.bookings_for_user(&auth.user_id).await?;
    let bookings = reports::with_shows(state.store.as_ref(), bookings).await?;
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

/// Favorites reference both a registered user and a registered movie.
async fn ensure_can_favorite(state: &AppState, user_id: &str, movie_id: i64) -> AppResult<()> {
    if state.store.user(user_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    if state.store.movie(movie_id).await?.is_none() {
        return Err(AppError::not_found("Movie not found"));
    }
    Ok(())
}

// POST /api/user/update-favorite
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub movie_id: i64,
}

async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<FavoriteRequest>,
) -> AppResult<Json<Value>> {
    let is_favorite = if state.store.remove_favorite(&auth.user_id, req.movie_id).await? {
        false
    } else {
        ensure_can_favorite(&state, &auth.user_id, req.movie_id).await?;
        state.store.add_favorite(&auth.user_id, req.movie_id).await?;
        true
    };
    info!("User {} favorite {} -> {}", auth.user_id, req.movie_id, is_favorite);

    Ok(Json(json!({
        "success": true,
        "message": "Favorite movies updated.",
        "isFavorite": is_favorite
    })))
}

// POST /api/user/favorites/{movie_id}
async fn add_favorite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<Value>> {
    ensure_can_favorite(&state, &auth.user_id, movie_id).await?;
    let added = state.store.add_favorite(&auth.user_id, movie_id).await?;
    let message = if added { "Added to favorites" } else { "Already a favorite" };
    Ok(Json(json!({ "success": true, "message": message, "isFavorite": true })))
}

// DELETE /api/user/favorites/{movie_id}
async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let removed = state.store.remove_favorite(&auth.user_id, movie_id).await?;
    let message = if removed { "Removed from favorites" } else { "Not a favorite" };
    Ok(Json(json!({ "success": true, "message": message, "isFavorite": false })))
}

// GET /api/user/favorites
async fn favorites(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<Value>> {
    let ids = state.store.favorite_movie_ids(&auth.user_id).await?;
    let movies = state.store.movies_by_ids(&ids).await?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}
