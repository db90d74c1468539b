//! Reservation committer.
//!
//! Validates a booking request, recomputes its price on the server and hands
//! it to the store, whose `commit_booking` re-checks and claims the seats
//! under a per-show lock. Seats are never released once claimed.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::config::BookingConfig;
use crate::error::{AppError, AppResult};
use crate::models::{show::parse_seat_request, Booking, NewBooking};
use crate::store::{BookingStore, ShowStore, Store, UserStore};

/// Largest accepted difference between the client's amount and the
/// server-computed total.
pub const AMOUNT_TOLERANCE: f64 = 0.005;

#[derive(Clone)]
pub struct Reservations {
    store: Arc<dyn Store>,
    max_seats: usize,
}

impl Reservations {
    pub fn new(store: Arc<dyn Store>, config: &BookingConfig) -> Self {
        Self {
            store,
            max_seats: config.max_seats_per_booking,
        }
    }

    pub async fn commit_booking(
        &self,
        show_id: i64,
        user_id: &str,
        requested_seats: &[String],
        amount: f64,
    ) -> AppResult<Booking> {
        if show_id <= 0 {
            return Err(AppError::validation("showId must be > 0"));
        }
        let seats = parse_seat_request(requested_seats, self.max_seats)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        if self.store.user(user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        let show = self
            .store
            .show(show_id)
            .await?
            .ok_or_else(|| AppError::not_found("Show not found"))?;

        if show.show_date_time < Utc::now() {
            return Err(AppError::validation("This show has already started"));
        }

        let expected = show.price_for(seats.len());
        if (amount - expected).abs() > AMOUNT_TOLERANCE {
            return Err(AppError::validation(format!(
                "Amount {:.2} does not match the price of {} seat(s): {:.2}",
                amount,
                seats.len(),
                expected
            )));
        }

        let booking = self
            .store
            .commit_booking(NewBooking {
                show_id,
                user_id: user_id.to_string(),
                seats,
                amount: expected,
            })
            .await?;

        info!(
            "Booking {} committed: show={}, user={}, seats={:?}, amount={:.2}",
            booking.id, show_id, user_id, booking.booked_seats, booking.amount
        );
        Ok(booking)
    }
}
