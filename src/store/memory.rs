use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{BookingStore, MovieStore, ShowDeletion, ShowStore, TheaterStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::theater::DUPLICATE_THEATER;
use crate::models::{
    user::UserProfile, Booking, Movie, MovieInput, NewBooking, NewShow, Occupancy, Show, Theater,
    TheaterFilter, TheaterInput, TheaterPage, User,
};

/// Process-local backend. Each show sits behind its own mutex, which is the
/// per-show lock that serialises booking commits.
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    shows: RwLock<BTreeMap<i64, Arc<Mutex<Show>>>>,
    bookings: RwLock<Vec<Booking>>,
    movies: RwLock<BTreeMap<i64, Movie>>,
    users: RwLock<BTreeMap<String, User>>,
    favorites: RwLock<HashMap<String, BTreeSet<i64>>>,
    theaters: RwLock<BTreeMap<i64, Theater>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn show_slot(&self, id: i64) -> Option<Arc<Mutex<Show>>> {
        self.shows.read().await.get(&id).cloned()
    }

    async fn snapshot_shows<F>(&self, keep: F) -> Vec<Show>
    where
        F: Fn(&Show) -> bool,
    {
        let slots: Vec<Arc<Mutex<Show>>> = self.shows.read().await.values().cloned().collect();
        let mut shows = Vec::with_capacity(slots.len());
        for slot in slots {
            let show = slot.lock().await;
            if keep(&show) {
                shows.push(show.clone());
            }
        }
        shows.sort_by_key(|s| (s.show_date_time, s.id));
        shows
    }
}

fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    bookings
}

#[async_trait]
impl ShowStore for MemoryStore {
    async fn insert_show(&self, new: NewShow) -> AppResult<Show> {
        let show = Show {
            id: self.next_id(),
            movie_id: new.movie_id,
            theater: new.theater,
            show_date_time: new.show_date_time,
            show_price: new.show_price,
            occupied_seats: Occupancy::new(),
            created_at: Utc::now(),
        };
        self.shows
            .write()
            .await
            .insert(show.id, Arc::new(Mutex::new(show.clone())));
        Ok(show)
    }

    async fn show(&self, id: i64) -> AppResult<Option<Show>> {
        match self.show_slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn upcoming_shows(&self, now: DateTime<Utc>) -> AppResult<Vec<Show>> {
        Ok(self.snapshot_shows(|s| s.show_date_time >= now).await)
    }

    async fn upcoming_shows_for_movie(&self, movie_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Show>> {
        Ok(self
            .snapshot_shows(|s| s.movie_id == movie_id && s.show_date_time >= now)
            .await)
    }

    async fn count_upcoming_at_theater(&self, theater: &str, now: DateTime<Utc>) -> AppResult<i64> {
        let shows = self
            .snapshot_shows(|s| s.theater == theater && s.show_date_time >= now)
            .await;
        Ok(shows.len() as i64)
    }

    async fn delete_show(&self, id: i64, now: DateTime<Utc>) -> AppResult<ShowDeletion> {
        let Some(slot) = self.show_slot(id).await else {
            return Ok(ShowDeletion::NotFound);
        };
        // lock order: show, bookings, shows map
        let show = slot.lock().await;
        let mut bookings = self.bookings.write().await;
        let mut shows = self.shows.write().await;
        if !shows.get(&id).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
            return Ok(ShowDeletion::NotFound);
        }
        let has_bookings = bookings.iter().any(|b| b.show_id == id);
        if show.show_date_time >= now && has_bookings {
            return Ok(ShowDeletion::HasActiveBookings);
        }
        bookings.retain(|b| b.show_id != id);
        shows.remove(&id);
        Ok(ShowDeletion::Deleted)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn commit_booking(&self, new: NewBooking) -> AppResult<Booking> {
        let slot = self
            .show_slot(new.show_id)
            .await
            .ok_or_else(|| AppError::not_found("Show not found"))?;

        let mut show = slot.lock().await;
        // every lock is held before occupancy changes, so a dropped commit
        // leaves nothing behind
        let mut bookings = self.bookings.write().await;
        if !self.shows.read().await.contains_key(&new.show_id) {
            return Err(AppError::not_found("Show not found"));
        }
        show.occupied_seats.occupy(&new.seats, &new.user_id)?;

        let booking = Booking {
            id: self.next_id(),
            user_id: new.user_id,
            show_id: new.show_id,
            booked_seats: new.seats,
            amount: new.amount,
            is_paid: false,
            created_at: Utc::now(),
        };
        bookings.push(booking.clone());
        Ok(booking)
    }

    async fn bookings_for_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(newest_first(
            bookings.iter().filter(|b| b.user_id == user_id).cloned().collect(),
        ))
    }

    async fn bookings_for_show(&self, show_id: i64) -> AppResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.iter().filter(|b| b.show_id == show_id).cloned().collect())
    }

    async fn all_bookings(&self) -> AppResult<Vec<Booking>> {
        Ok(newest_first(self.bookings.read().await.clone()))
    }

    async fn paid_bookings(&self) -> AppResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.iter().filter(|b| b.is_paid).cloned().collect())
    }

    async fn mark_paid(&self, id: i64) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        Ok(bookings.iter_mut().find(|b| b.id == id).map(|b| {
            b.is_paid = true;
            b.clone()
        }))
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn upsert_movie(&self, input: MovieInput) -> AppResult<Movie> {
        let mut movies = self.movies.write().await;
        let created_at = movies.get(&input.id).map(|m| m.created_at).unwrap_or_else(Utc::now);
        let movie = Movie {
            id: input.id,
            title: input.title,
            overview: input.overview,
            poster_path: input.poster_path,
            backdrop_path: input.backdrop_path,
            release_date: input.release_date,
            runtime: input.runtime,
            vote_average: input.vote_average,
            created_at,
        };
        movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn movie(&self, id: i64) -> AppResult<Option<Movie>> {
        Ok(self.movies.read().await.get(&id).cloned())
    }

    async fn movies_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Movie>> {
        let movies = self.movies.read().await;
        let mut found: Vec<Movie> = ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| movies.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(found)
    }

    async fn all_movies(&self) -> AppResult<Vec<Movie>> {
        let mut movies: Vec<Movie> = self.movies.read().await.values().cloned().collect();
        movies.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(movies)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, profile: UserProfile) -> AppResult<User> {
        let mut users = self.users.write().await;
        let user = match users.get(&profile.id) {
            Some(existing) => User {
                name: profile.name,
                email: profile.email,
                image: profile.image.unwrap_or_else(|| existing.image.clone()),
                ..existing.clone()
            },
            None => User {
                id: profile.id,
                name: profile.name,
                email: profile.email,
                image: profile.image.unwrap_or_default(),
                role: profile.initial_role.to_string(),
                created_at: Utc::now(),
            },
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn user(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn all_users(&self) -> AppResult<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.users.read().await.len() as i64)
    }

    async fn set_role(&self, id: &str, role: &str) -> AppResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(id).map(|u| {
            u.role = role.to_string();
            u.clone()
        }))
    }

    async fn favorite_movie_ids(&self, user_id: &str) -> AppResult<Vec<i64>> {
        let favorites = self.favorites.read().await;
        Ok(favorites
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn add_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool> {
        let mut favorites = self.favorites.write().await;
        Ok(favorites.entry(user_id.to_string()).or_default().insert(movie_id))
    }

    async fn remove_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool> {
        let mut favorites = self.favorites.write().await;
        Ok(favorites
            .get_mut(user_id)
            .map(|set| set.remove(&movie_id))
            .unwrap_or(false))
    }
}

fn theater_from_input(id: i64, input: TheaterInput, created_at: DateTime<Utc>) -> Theater {
    Theater {
        id,
        name: input.name,
        location: input.location,
        address: input.address,
        city: input.city,
        state: input.state,
        zip_code: input.zip_code,
        phone: input.phone,
        email: input.email,
        capacity: input.capacity,
        amenities: input.amenities,
        description: input.description,
        is_active: input.is_active,
        created_at,
        updated_at: Utc::now(),
    }
}

fn matches_search(theater: &Theater, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [Some(&theater.name), Some(&theater.location), theater.city.as_ref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[async_trait]
impl TheaterStore for MemoryStore {
    async fn create_theater(&self, input: TheaterInput) -> AppResult<Theater> {
        let mut theaters = self.theaters.write().await;
        if theaters
            .values()
            .any(|t| t.name == input.name && t.location == input.location)
        {
            return Err(AppError::validation(DUPLICATE_THEATER));
        }
        let theater = theater_from_input(self.next_id(), input, Utc::now());
        theaters.insert(theater.id, theater.clone());
        Ok(theater)
    }

    async fn theater(&self, id: i64) -> AppResult<Option<Theater>> {
        Ok(self.theaters.read().await.get(&id).cloned())
    }

    async fn find_theater(&self, name: &str, location: &str) -> AppResult<Option<Theater>> {
        let theaters = self.theaters.read().await;
        Ok(theaters
            .values()
            .find(|t| t.name == name && t.location == location)
            .cloned())
    }

    async fn list_theaters(&self, filter: &TheaterFilter) -> AppResult<TheaterPage> {
        let theaters = self.theaters.read().await;
        let mut matching: Vec<Theater> = theaters
            .values()
            .filter(|t| filter.is_active.map_or(true, |active| t.is_active == active))
            .filter(|t| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(t, needle))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let theaters = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(TheaterPage { theaters, total })
    }

    async fn update_theater(&self, id: i64, input: TheaterInput) -> AppResult<Option<Theater>> {
        let mut theaters = self.theaters.write().await;
        let Some(created_at) = theaters.get(&id).map(|t| t.created_at) else {
            return Ok(None);
        };
        if theaters
            .values()
            .any(|t| t.id != id && t.name == input.name && t.location == input.location)
        {
            return Err(AppError::validation(DUPLICATE_THEATER));
        }
        let theater = theater_from_input(id, input, created_at);
        theaters.insert(id, theater.clone());
        Ok(Some(theater))
    }

    async fn delete_theater(&self, id: i64) -> AppResult<bool> {
        Ok(self.theaters.write().await.remove(&id).is_some())
    }

    async fn set_theater_active(&self, id: i64, active: bool) -> AppResult<Option<Theater>> {
        let mut theaters = self.theaters.write().await;
        Ok(theaters.get_mut(&id).map(|t| {
            t.is_active = active;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn count_active_theaters(&self) -> AppResult<i64> {
        Ok(self.theaters.read().await.values().filter(|t| t.is_active).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_show(price: f64, starts_in_hours: i64) -> NewShow {
        NewShow {
            movie_id: 550,
            theater: "Grand".to_string(),
            show_date_time: Utc::now() + Duration::hours(starts_in_hours),
            show_price: price,
        }
    }

    fn booking(show_id: i64, user: &str, seats: &[&str]) -> NewBooking {
        NewBooking {
            show_id,
            user_id: user.to_string(),
            seats: seats.iter().map(|s| s.to_string()).collect(),
            amount: 10.0 * seats.len() as f64,
        }
    }

    #[tokio::test]
    async fn commit_records_booking_and_occupancy_together() {
        let store = MemoryStore::new();
        let show = store.insert_show(new_show(10.0, 24)).await.unwrap();

        let b = store.commit_booking(booking(show.id, "u1", &["A1", "A2"])).await.unwrap();
        assert!(!b.is_paid);

        let show = store.show(show.id).await.unwrap().unwrap();
        assert_eq!(show.occupied_seats.holder("A1"), Some("u1"));
        assert_eq!(store.bookings_for_show(show.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_commit_creates_no_booking() {
        let store = MemoryStore::new();
        let show = store.insert_show(new_show(10.0, 24)).await.unwrap();
        store.commit_booking(booking(show.id, "u1", &["A1"])).await.unwrap();

        let err = store
            .commit_booking(booking(show.id, "u2", &["B1", "A1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SeatsUnavailable(_)));
        assert_eq!(store.all_bookings().await.unwrap().len(), 1);
        let show = store.show(show.id).await.unwrap().unwrap();
        assert!(show.occupied_seats.is_free("B1"));
    }

    #[tokio::test]
    async fn commit_on_missing_show_is_not_found() {
        let store = MemoryStore::new();
        let err = store.commit_booking(booking(42, "u1", &["A1"])).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn upcoming_excludes_past_shows_and_sorts_by_start() {
        let store = MemoryStore::new();
        let later = store.insert_show(new_show(10.0, 48)).await.unwrap();
        store.insert_show(new_show(10.0, -2)).await.unwrap();
        let sooner = store.insert_show(new_show(10.0, 3)).await.unwrap();

        let ids: Vec<i64> = store
            .upcoming_shows(Utc::now())
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![sooner.id, later.id]);
    }

    #[tokio::test]
    async fn future_show_with_bookings_cannot_be_deleted() {
        let store = MemoryStore::new();
        let future = store.insert_show(new_show(10.0, 24)).await.unwrap();
        let past = store.insert_show(new_show(10.0, -24)).await.unwrap();
        store.commit_booking(booking(future.id, "u1", &["A1"])).await.unwrap();
        store.commit_booking(booking(past.id, "u1", &["A1"])).await.unwrap();

        let now = Utc::now();
        assert_eq!(store.delete_show(future.id, now).await.unwrap(), ShowDeletion::HasActiveBookings);
        assert_eq!(store.delete_show(past.id, now).await.unwrap(), ShowDeletion::Deleted);
        assert_eq!(store.delete_show(past.id, now).await.unwrap(), ShowDeletion::NotFound);
        assert!(store.bookings_for_show(past.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bookings_for_user_are_newest_first() {
        let store = MemoryStore::new();
        let show = store.insert_show(new_show(10.0, 24)).await.unwrap();
        let first = store.commit_booking(booking(show.id, "u1", &["A1"])).await.unwrap();
        let second = store.commit_booking(booking(show.id, "u1", &["A2"])).await.unwrap();
        store.commit_booking(booking(show.id, "u2", &["A3"])).await.unwrap();

        let ids: Vec<i64> = store
            .bookings_for_user("u1")
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn cancelled_commit_claims_nothing() {
        let store = MemoryStore::new();
        let show = store.insert_show(new_show(10.0, 24)).await.unwrap();

        // a reader keeps the booking log busy while the commit is abandoned
        let reader = store.bookings.read().await;
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.commit_booking(booking(show.id, "u1", &["A1"])),
        )
        .await;
        assert!(outcome.is_err());
        drop(reader);

        let show = store.show(show.id).await.unwrap().unwrap();
        assert!(show.occupied_seats.is_free("A1"));
        assert!(store.all_bookings().await.unwrap().is_empty());

        store.commit_booking(booking(show.id, "u2", &["A1"])).await.unwrap();
        let show = store.show(show.id).await.unwrap().unwrap();
        assert_eq!(show.occupied_seats.holder("A1"), Some("u2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pending_delete_does_not_block_other_shows() {
        let store = Arc::new(MemoryStore::new());
        let busy = store.insert_show(new_show(10.0, -1)).await.unwrap();
        let other = store.insert_show(new_show(10.0, 24)).await.unwrap();

        let slot = store.show_slot(busy.id).await.unwrap();
        let held = slot.lock().await;

        let deleting = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_show(busy.id, Utc::now()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let lookup = tokio::time::timeout(std::time::Duration::from_millis(200), store.show(other.id)).await;
        assert_eq!(lookup.unwrap().unwrap().unwrap().id, other.id);

        drop(held);
        assert_eq!(deleting.await.unwrap().unwrap(), ShowDeletion::Deleted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commit_queued_behind_delete_sees_show_gone() {
        let store = Arc::new(MemoryStore::new());
        let show = store.insert_show(new_show(10.0, -1)).await.unwrap();

        let slot = store.show_slot(show.id).await.unwrap();
        let held = slot.lock().await;

        let deleting = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_show(show.id, Utc::now()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let committing = {
            let store = store.clone();
            tokio::spawn(async move { store.commit_booking(booking(show.id, "u1", &["A1"])).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(held);

        assert_eq!(deleting.await.unwrap().unwrap(), ShowDeletion::Deleted);
        assert!(matches!(committing.await.unwrap(), Err(AppError::NotFound(_))));
        assert!(store.all_bookings().await.unwrap().is_empty());
    }
}
