pub mod admin;
pub mod bookings;
pub mod shows;
pub mod theaters;
pub mod users;

use axum::{extract::FromRequest, Router};
use std::sync::Arc;
use tracing::warn;

use crate::error::AppError;
use crate::store::ShowStore;
use crate::AppState;

/// `Json` whose rejection uses the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/booking", bookings::routes())
        .nest("/show", shows::routes())
        .nest("/user", users::routes())
        .nest("/admin", admin::routes().merge(theaters::routes()))
}

impl AppState {
    /// Drops the cached occupied seats of a show. No-op without a cache.
    pub(crate) async fn invalidate_seats(&self, show_id: i64) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(show_id).await;
        }
    }

    /// Writes the show's current occupancy to the cache on a detached task,
    /// so it completes even if the requesting client goes away.
    pub(crate) fn refresh_seats(&self, show_id: i64) -> Option<tokio::task::JoinHandle<()>> {
        let cache = self.cache.clone()?;
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            let seats = match store.show(show_id).await {
                Ok(Some(show)) => show.occupied_seats.labels(),
                Ok(None) => return,
                Err(e) => {
                    warn!("seats refresh for show {} failed: {:?}", show_id, e);
                    cache.invalidate_seats(show_id).await;
                    return;
                }
            };
            if let Err(e) = cache.cache_occupied_seats(show_id, &seats).await {
                warn!("seats refresh for show {} failed: {:?}", show_id, e);
                cache.invalidate_seats(show_id).await;
            }
        }))
    }

    pub(crate) async fn invalidate_now_showing(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_now_showing().await;
        }
    }
}
