use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user's purchase of seats on a show. Only `is_paid` changes after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub user_id: String,
    pub show_id: i64,
    pub booked_seats: Vec<String>,
    pub amount: f64,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated input for the reservation committer.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub show_id: i64,
    pub user_id: String,
    pub seats: Vec<String>,
    pub amount: f64,
}

/// Aggregate figures for one show, used by the admin back office.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowReport {
    pub bookings: usize,
    pub seats_sold: usize,
    pub earnings: f64,
}

impl ShowReport {
    pub fn new(bookings: &[Booking], seats_sold: usize, price: f64) -> Self {
        Self {
            bookings: bookings.len(),
            seats_sold,
            earnings: seats_sold as f64 * price,
        }
    }
}
