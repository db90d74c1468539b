use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::controllers::ApiJson;
use crate::error::{AppError, AppResult};
use crate::middleware::AdminUser;
use crate::models::{MovieInput, NewShow};
use crate::store::{MovieStore, ShowDeletion, ShowStore};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", post(upsert_movie).get(list_movies))
        .route("/add", post(add_shows))
        .route("/all", get(now_showing))
        .route("/{id}", get(movie_shows).delete(delete_show))
}

/* ---------- movies ---------- */

// POST /api/show/movies
async fn upsert_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(input): ApiJson<MovieInput>,
) -> AppResult<Json<Value>> {
    input.validate()?;
    let movie = state.store.upsert_movie(input).await?;
    state.invalidate_now_showing().await;

    Ok(Json(json!({ "success": true, "message": "Movie saved", "movie": movie })))
}

// GET /api/show/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let movies = state.store.all_movies().await?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}

/* ---------- shows ---------- */

#[derive(Debug, Deserialize)]
pub struct ShowSlots {
    pub date: String,
    pub time: Vec<String>,
}

// POST /api/show/add
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddShowsRequest {
    pub movie_id: i64,
    pub show_price: f64,
    pub theater: String,
    pub shows_input: Vec<ShowSlots>,
}

/// Expands `date × time` slots into UTC start times.
fn slot_times(slots: &[ShowSlots]) -> AppResult<Vec<DateTime<Utc>>> {
    let mut times = Vec::new();
    for slot in slots {
        let date = NaiveDate::parse_from_str(slot.date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::validation(format!("Invalid date {:?}, expected YYYY-MM-DD", slot.date)))?;
        for raw in &slot.time {
            let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|_| AppError::validation(format!("Invalid time {:?}, expected HH:MM", raw)))?;
            times.push(date.and_time(time).and_utc());
        }
    }
    Ok(times)
}

async fn add_shows(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<AddShowsRequest>,
) -> AppResult<impl IntoResponse> {
    let theater = req.theater.trim();
    if theater.is_empty() {
        return Err(AppError::validation("Theater is required"));
    }
    if !req.show_price.is_finite() || req.show_price <= 0.0 {
        return Err(AppError::validation("Show price must be greater than 0"));
    }

    let times = slot_times(&req.shows_input)?;
    if times.is_empty() {
        return Err(AppError::validation("At least one show time is required"));
    }
    let now = Utc::now();
    if times.iter().any(|t| *t < now) {
        return Err(AppError::validation("Show times must be in the future"));
    }

    if state.store.movie(req.movie_id).await?.is_none() {
        return Err(AppError::not_found("Movie not found"));
    }

    let mut shows = Vec::with_capacity(times.len());
    for show_date_time in times {
        let show = state
            .store
            .insert_show(NewShow {
                movie_id: req.movie_id,
                theater: theater.to_string(),
                show_date_time,
                show_price: req.show_price,
            })
            .await?;
        shows.push(show);
    }
    state.invalidate_now_showing().await;
    info!("Added {} show(s) for movie {} at {}", shows.len(), req.movie_id, theater);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Show added successfully", "shows": shows })),
    ))
}

// GET /api/show/all
async fn now_showing(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    if let Some(cache) = &state.cache {
        match cache.get_now_showing().await {
            Ok(Some(cached_json)) => return Ok(cached_response(cached_json, "HIT")),
            Ok(None) => {}
            Err(e) => warn!("now-showing cache read failed: {:?}", e),
        }
    }

    let upcoming = state.store.upcoming_shows(Utc::now()).await?;
    let ids: Vec<i64> = upcoming
        .iter()
        .map(|s| s.movie_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let movies = state.store.movies_by_ids(&ids).await?;
    let body = json!({ "success": true, "shows": movies });

    let Some(cache) = &state.cache else {
        return Ok(Json(body).into_response());
    };
    let json_str = body.to_string();
    if let Err(e) = cache.cache_now_showing(&json_str).await {
        warn!("now-showing cache write failed: {:?}", e);
    }
    Ok(cached_response(json_str, "MISS"))
}

fn cached_response(json: String, status: &'static str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json"), (header::HeaderName::from_static("x-cache"), status)],
        Body::from(json),
    )
        .into_response()
}

/// One bookable start time on the seat-selection screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSlot {
    pub time: DateTime<Utc>,
    pub show_id: i64,
    pub price: f64,
    pub theater: String,
    pub occupied_seats: Vec<String>,
}

// GET /api/show/{movie_id}
async fn movie_shows(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let movie = state
        .store
        .movie(movie_id)
        .await?
        .ok_or_else(|| AppError::not_found("Movie not found"))?;

    let mut date_time: BTreeMap<String, Vec<ShowSlot>> = BTreeMap::new();
    for show in state.store.upcoming_shows_for_movie(movie_id, Utc::now()).await? {
        date_time
            .entry(show.show_date_time.format("%Y-%m-%d").to_string())
            .or_default()
            .push(ShowSlot {
                time: show.show_date_time,
                show_id: show.id,
                price: show.show_price,
                theater: show.theater,
                occupied_seats: show.occupied_seats.labels(),
            });
    }

    Ok(Json(json!({ "success": true, "movie": movie, "dateTime": date_time })))
}

// DELETE /api/show/{show_id}
async fn delete_show(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(show_id): Path<i64>,
) -> AppResult<Json<Value>> {
    match state.store.delete_show(show_id, Utc::now()).await? {
        ShowDeletion::Deleted => {
            state.invalidate_seats(show_id).await;
            state.invalidate_now_showing().await;
            info!("Show {} deleted by {}", show_id, admin.user.id);
            Ok(Json(json!({ "success": true, "message": "Show deleted successfully" })))
        }
        ShowDeletion::NotFound => Err(AppError::not_found("Show not found")),
        ShowDeletion::HasActiveBookings => Err(AppError::Conflict(
            "Cannot delete an upcoming show that already has bookings".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(date: &str, times: &[&str]) -> ShowSlots {
        ShowSlots {
            date: date.to_string(),
            time: times.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn slots_expand_to_utc_times() {
        let times = slot_times(&[slots("2031-05-01", &["10:00", "21:30"]), slots("2031-05-02", &["09:15"])])
            .unwrap();
        let rendered: Vec<String> = times.iter().map(|t| t.to_rfc3339()).collect();
        assert_eq!(
            rendered,
            vec![
                "2031-05-01T10:00:00+00:00",
                "2031-05-01T21:30:00+00:00",
                "2031-05-02T09:15:00+00:00"
            ]
        );
    }

    #[test]
    fn malformed_slots_are_rejected() {
        assert!(slot_times(&[slots("01/05/2031", &["10:00"])]).is_err());
        assert!(slot_times(&[slots("2031-05-01", &["25:00"])]).is_err());
        assert!(slot_times(&[slots("2031-05-01", &["10am"])]).is_err());
    }
}
