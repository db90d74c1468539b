use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::info;

use super::{BookingStore, MovieStore, ShowDeletion, ShowStore, TheaterStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::theater::DUPLICATE_THEATER;
use crate::models::{
    user::UserProfile, Booking, Movie, MovieInput, NewBooking, NewShow, Show, Theater,
    TheaterFilter, TheaterInput, TheaterPage, User,
};

/// Postgres backend. Booking commits take a row lock on the show
/// (`SELECT ... FOR UPDATE`) for the whole check-and-write transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

fn theater_write_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::validation(DUPLICATE_THEATER)
        }
        _ => AppError::Database(e),
    }
}

// ILIKE pattern with the wildcard characters of the needle escaped
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl ShowStore for PgStore {
    async fn insert_show(&self, show: NewShow) -> AppResult<Show> {
        let show = sqlx::query_as::<_, Show>(
            r#"
            INSERT INTO shows (movie_id, theater, show_date_time, show_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, movie_id, theater, show_date_time, show_price, occupied_seats, created_at
            "#,
        )
        .bind(show.movie_id)
        .bind(&show.theater)
        .bind(show.show_date_time)
        .bind(show.show_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(show)
    }

    async fn show(&self, id: i64) -> AppResult<Option<Show>> {
        let show = sqlx::query_as::<_, Show>(
            "SELECT id, movie_id, theater, show_date_time, show_price, occupied_seats, created_at
             FROM shows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(show)
    }

    async fn upcoming_shows(&self, now: DateTime<Utc>) -> AppResult<Vec<Show>> {
        let shows = sqlx::query_as::<_, Show>(
            "SELECT id, movie_id, theater, show_date_time, show_price, occupied_seats, created_at
             FROM shows
             WHERE show_date_time >= $1
             ORDER BY show_date_time, id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(shows)
    }

    async fn upcoming_shows_for_movie(&self, movie_id: i64, now: DateTime<Utc>) -> AppResult<Vec<Show>> {
        let shows = sqlx::query_as::<_, Show>(
            "SELECT id, movie_id, theater, show_date_time, show_price, occupied_seats, created_at
             FROM shows
             WHERE movie_id = $1 AND show_date_time >= $2
             ORDER BY show_date_time, id",
        )
        .bind(movie_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(shows)
    }

    async fn count_upcoming_at_theater(&self, theater: &str, now: DateTime<Utc>) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM shows WHERE theater = $1 AND show_date_time >= $2",
        )
        .bind(theater)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn delete_show(&self, id: i64, now: DateTime<Utc>) -> AppResult<ShowDeletion> {
        let mut tx = self.pool.begin().await?;

        // lock the row so no booking can land between the check and the delete
        let starts_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT show_date_time FROM shows WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(starts_at) = starts_at else {
            return Ok(ShowDeletion::NotFound);
        };

        if starts_at >= now {
            let has_bookings = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM bookings WHERE show_id = $1)",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if has_bookings {
                return Ok(ShowDeletion::HasActiveBookings);
            }
        }

        sqlx::query("DELETE FROM shows WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(ShowDeletion::Deleted)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn commit_booking(&self, new: NewBooking) -> AppResult<Booking> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        // 1) Lock the show row; concurrent commits on this show queue here
        let mut show = sqlx::query_as::<_, Show>(
            "SELECT id, movie_id, theater, show_date_time, show_price, occupied_seats, created_at
             FROM shows WHERE id = $1
             FOR UPDATE",
        )
        .bind(new.show_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Show not found"))?;

        // 2) Check and claim against the locked occupancy
        show.occupied_seats.occupy(&new.seats, &new.user_id)?;

        // 3) Booking record
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (user_id, show_id, booked_seats, amount, is_paid)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, user_id, show_id, booked_seats, amount, is_paid, created_at
            "#,
        )
        .bind(&new.user_id)
        .bind(new.show_id)
        .bind(&new.seats)
        .bind(new.amount)
        .fetch_one(&mut *tx)
        .await?;

        // 4) Occupancy
        sqlx::query("UPDATE shows SET occupied_seats = $2 WHERE id = $1")
            .bind(new.show_id)
            .bind(Json(&show.occupied_seats))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn bookings_for_user(&self, user_id: &str) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, show_id, booked_seats, amount, is_paid, created_at
             FROM bookings
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn bookings_for_show(&self, show_id: i64) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, show_id, booked_seats, amount, is_paid, created_at
             FROM bookings
             WHERE show_id = $1
             ORDER BY id",
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn all_bookings(&self) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, show_id, booked_seats, amount, is_paid, created_at
             FROM bookings
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn paid_bookings(&self) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, show_id, booked_seats, amount, is_paid, created_at
             FROM bookings
             WHERE is_paid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn mark_paid(&self, id: i64) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET is_paid = TRUE WHERE id = $1
             RETURNING id, user_id, show_id, booked_seats, amount, is_paid, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }
}

#[async_trait]
impl MovieStore for PgStore {
    async fn upsert_movie(&self, movie: MovieInput) -> AppResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (id, title, overview, poster_path, backdrop_path, release_date, runtime, vote_average)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                overview = EXCLUDED.overview,
                poster_path = EXCLUDED.poster_path,
                backdrop_path = EXCLUDED.backdrop_path,
                release_date = EXCLUDED.release_date,
                runtime = EXCLUDED.runtime,
                vote_average = EXCLUDED.vote_average
            RETURNING id, title, overview, poster_path, backdrop_path, release_date, runtime, vote_average, created_at
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.overview)
        .bind(&movie.poster_path)
        .bind(&movie.backdrop_path)
        .bind(movie.release_date)
        .bind(movie.runtime)
        .bind(movie.vote_average)
        .fetch_one(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn movie(&self, id: i64) -> AppResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, title, overview, poster_path, backdrop_path, release_date, runtime, vote_average, created_at
             FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn movies_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT id, title, overview, poster_path, backdrop_path, release_date, runtime, vote_average, created_at
             FROM movies WHERE id = ANY($1)
             ORDER BY title",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn all_movies(&self) -> AppResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT id, title, overview, poster_path, backdrop_path, release_date, runtime, vote_average, created_at
             FROM movies ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_user(&self, profile: UserProfile) -> AppResult<User> {
        // role is only written on insert
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, image, role)
            VALUES ($1, $2, $3, COALESCE($4, ''), $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                image = COALESCE($4, users.image)
            RETURNING id, name, email, image, role, created_at
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.image)
        .bind(profile.initial_role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user(&self, id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn all_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, role, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_role(&self, id: &str, role: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2 WHERE id = $1
             RETURNING id, name, email, image, role, created_at",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn favorite_movie_ids(&self, user_id: &str) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT movie_id FROM favorites WHERE user_id = $1 ORDER BY movie_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn add_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool> {
        let added = sqlx::query(
            "INSERT INTO favorites (user_id, movie_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;
        Ok(added)
    }

    async fn remove_favorite(&self, user_id: &str, movie_id: i64) -> AppResult<bool> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;
        Ok(removed)
    }
}

#[async_trait]
impl TheaterStore for PgStore {
    async fn create_theater(&self, t: TheaterInput) -> AppResult<Theater> {
        sqlx::query_as::<_, Theater>(
            r#"
            INSERT INTO theaters
                (name, location, address, city, state, zip_code, phone, email, capacity, amenities, description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, name, location, address, city, state, zip_code, phone, email,
                      capacity, amenities, description, is_active, created_at, updated_at
            "#,
        )
        .bind(&t.name)
        .bind(&t.location)
        .bind(&t.address)
        .bind(&t.city)
        .bind(&t.state)
        .bind(&t.zip_code)
        .bind(&t.phone)
        .bind(&t.email)
        .bind(t.capacity)
        .bind(&t.amenities)
        .bind(&t.description)
        .bind(t.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(theater_write_error)
    }

    async fn theater(&self, id: i64) -> AppResult<Option<Theater>> {
        let theater = sqlx::query_as::<_, Theater>(
            "SELECT id, name, location, address, city, state, zip_code, phone, email,
                    capacity, amenities, description, is_active, created_at, updated_at
             FROM theaters WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(theater)
    }

    async fn find_theater(&self, name: &str, location: &str) -> AppResult<Option<Theater>> {
        let theater = sqlx::query_as::<_, Theater>(
            "SELECT id, name, location, address, city, state, zip_code, phone, email,
                    capacity, amenities, description, is_active, created_at, updated_at
             FROM theaters WHERE name = $1 AND location = $2",
        )
        .bind(name)
        .bind(location)
        .fetch_optional(&self.pool)
        .await?;
        Ok(theater)
    }

    async fn list_theaters(&self, filter: &TheaterFilter) -> AppResult<TheaterPage> {
        let pattern = filter.search.as_deref().map(like_pattern);

        let theaters = sqlx::query_as::<_, Theater>(
            r#"
            SELECT id, name, location, address, city, state, zip_code, phone, email,
                   capacity, amenities, description, is_active, created_at, updated_at
            FROM theaters
            WHERE ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR location ILIKE $2 OR city ILIKE $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.is_active)
        .bind(&pattern)
        .bind(filter.limit as i64)
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM theaters
            WHERE ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR location ILIKE $2 OR city ILIKE $2)
            "#,
        )
        .bind(filter.is_active)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(TheaterPage { theaters, total })
    }

    async fn update_theater(&self, id: i64, t: TheaterInput) -> AppResult<Option<Theater>> {
        sqlx::query_as::<_, Theater>(
            r#"
            UPDATE theaters SET
                name = $2, location = $3, address = $4, city = $5, state = $6, zip_code = $7,
                phone = $8, email = $9, capacity = $10, amenities = $11, description = $12,
                is_active = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, location, address, city, state, zip_code, phone, email,
                      capacity, amenities, description, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&t.name)
        .bind(&t.location)
        .bind(&t.address)
        .bind(&t.city)
        .bind(&t.state)
        .bind(&t.zip_code)
        .bind(&t.phone)
        .bind(&t.email)
        .bind(t.capacity)
        .bind(&t.amenities)
        .bind(&t.description)
        .bind(t.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(theater_write_error)
    }

    async fn delete_theater(&self, id: i64) -> AppResult<bool> {
        let deleted = sqlx::query("DELETE FROM theaters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;
        Ok(deleted)
    }

    async fn set_theater_active(&self, id: i64, active: bool) -> AppResult<Option<Theater>> {
        let theater = sqlx::query_as::<_, Theater>(
            "UPDATE theaters SET is_active = $2, updated_at = NOW() WHERE id = $1
             RETURNING id, name, location, address, city, state, zip_code, phone, email,
                       capacity, amenities, description, is_active, created_at, updated_at",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(theater)
    }

    async fn count_active_theaters(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM theaters WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
