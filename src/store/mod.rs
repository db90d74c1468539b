//! Persistence seams.
//!
//! Every backend must make [`BookingStore::commit_booking`] atomic per show:
//! the occupancy check and the write of booking + occupancy happen while no
//! other commit on the same show can interleave.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    user::UserProfile, Booking, Movie, MovieInput, NewBooking, NewShow, Show, Theater,
    TheaterFilter, TheaterInput, TheaterPage, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowDeletion {
    Deleted,
    NotFound,
    HasActiveBookings,
}

#[async_trait]
pub trait ShowStore: Send + Sync {
    async fn insert_show(&self, show: NewShow) -> AppResult<Show>;

    async fn show(&self, id: i64) -> AppResult<Option<Show>>;

    /// Shows starting at or after `now`, earliest first.
    async fn upcoming_shows(&self, now: DateTime<Utc>) -> AppResult<Vec<Show>>;

    async fn upcoming_shows_for_movie(&self, movie_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Show>>;

    async fn count_upcoming_at_theater(&self, theater: &str, now: DateTime<Utc>) -> AppResult<i64>;

    /// Removes a show unless it starts at or after `now` and already has
    /// bookings. Bookings of a removed past show go with it.
    async fn delete_show(&self, id: i64, now: DateTime<Utc>) -> AppResult<ShowDeletion>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Re-checks occupancy and, if every seat is free, records the booking
    /// and claims the seats as one unit. Fails with `SeatsUnavailable`
    /// without touching anything when a seat is already held.
    async fn commit_booking(&self, booking: NewBooking) -> AppResult<Booking>;

    /// Newest first.
    async fn bookings_for_user(&self, user_id: &str) -> AppResult<Vec<Booking>>;

    async fn bookings_for_show(&self, show_id: i64) -> AppResult<Vec<Booking>>;

    /// Newest first.
    async fn all_bookings(&self) -> AppResult<Vec<Booking>>;

    async fn paid_bookings(&self) -> AppResult<Vec<Booking>>;

    /// Moves an unpaid booking to paid. `None` when the booking does not exist.
    async fn mark_paid(&self, id: i64) -> AppResult<Option<Booking>>;
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn upsert_movie(&self, movie: MovieInput) -> AppResult<Movie>;

    async fn movie(&self, id: i64) -> AppResult<Option<Movie>>;

    /// Movies among `ids`, unknown ids skipped, ordered by title.
    async fn movies_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Movie>>;

    async fn all_movies(&self) -> AppResult<Vec<Movie>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, profile: UserProfile) -> AppResult<User>;

    async fn user(&self, id: &str) -> AppResult<Option<User>>;

    async fn all_users(&self) -> AppResult<Vec<User>>;

    async fn count_users(&self) -> AppResult<i64>;

    async fn set_role(&self, id: &str, role: &str) -> AppResult<Option<User>>;

    async fn favorite_movie_ids(&self, user_id: &str) -> AppResult<Vec<i64>>;

    /// Returns false when the movie was already a favorite.
    async fn add_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool>;

    /// Returns false when the movie was not a favorite.
    async fn remove_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool>;
}

#[async_trait]
pub trait TheaterStore: Send + Sync {
    async fn create_theater(&self, theater: TheaterInput) -> AppResult<Theater>;

    async fn theater(&self, id: i64) -> AppResult<Option<Theater>>;

    async fn find_theater(&self, name: &str, location: &str) -> AppResult<Option<Theater>>;

    async fn list_theaters(&self, filter: &TheaterFilter) -> AppResult<TheaterPage>;

    async fn update_theater(&self, id: i64, theater: TheaterInput) -> AppResult<Option<Theater>>;

    async fn delete_theater(&self, id: i64) -> AppResult<bool>;

    async fn set_theater_active(&self, id: i64, active: bool) -> AppResult<Option<Theater>>;

    async fn count_active_theaters(&self) -> AppResult<i64>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: ShowStore + BookingStore + MovieStore + UserStore + TheaterStore {}

impl<T> Store for T where T: ShowStore + BookingStore + MovieStore + UserStore + TheaterStore {}
