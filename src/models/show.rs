use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::error::AppError;

/// A scheduled screening: one movie at one time, in one theater, at one price.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub id: i64,
    pub movie_id: i64,
    pub theater: String,
    pub show_date_time: DateTime<Utc>,
    pub show_price: f64,
    #[sqlx(json)]
    pub occupied_seats: Occupancy,
    pub created_at: DateTime<Utc>,
}

impl Show {
    /// Total a booking of `seat_count` seats must cost.
    pub fn price_for(&self, seat_count: usize) -> f64 {
        self.show_price * seat_count as f64
    }
}

#[derive(Debug, Clone)]
pub struct NewShow {
    pub movie_id: i64,
    pub theater: String,
    pub show_date_time: DateTime<Utc>,
    pub show_price: f64,
}

/// Seat label -> id of the user holding it. A missing label is a free seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Occupancy(BTreeMap<String, String>);

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn is_free(&self, label: &str) -> bool {
        !self.0.contains_key(label)
    }

    /// Labels from `requested` that are already held, in request order.
    pub fn taken<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        requested
            .iter()
            .filter(|label| !self.is_free(label))
            .map(String::as_str)
            .collect()
    }

    pub fn all_free(&self, requested: &[String]) -> bool {
        requested.iter().all(|label| self.is_free(label))
    }

    /// Claims every label for `user_id`, or none of them.
    pub fn occupy(&mut self, requested: &[String], user_id: &str) -> Result<(), AppError> {
        let taken = self.taken(requested);
        if !taken.is_empty() {
            return Err(AppError::SeatsUnavailable(
                taken.into_iter().map(String::from).collect(),
            ));
        }
        for label in requested {
            self.0.insert(label.clone(), user_id.to_string());
        }
        Ok(())
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalises and validates a seat label such as `C4` or `AA12`.
pub fn parse_seat_label(raw: &str) -> Result<String, AppError> {
    let label = raw.trim().to_ascii_uppercase();
    let split = label
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(label.len());
    let (row, number) = label.split_at(split);

    let valid = !row.is_empty()
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
        && !number.starts_with('0');

    if valid {
        Ok(label)
    } else {
        Err(AppError::validation(format!("Invalid seat label: {:?}", raw)))
    }
}

/// Validates a requested seat list: non-empty, well-formed, no duplicates.
/// Order is preserved.
pub fn parse_seat_request(raw: &[String], max_seats: usize) -> Result<Vec<String>, AppError> {
    if raw.is_empty() {
        return Err(AppError::validation("At least one seat must be selected"));
    }
    if raw.len() > max_seats {
        return Err(AppError::validation(format!(
            "You can only book up to {} seats at once",
            max_seats
        )));
    }

    let mut labels: Vec<String> = Vec::with_capacity(raw.len());
    for seat in raw {
        let label = parse_seat_label(seat)?;
        if labels.contains(&label) {
            return Err(AppError::validation(format!("Seat {} selected twice", label)));
        }
        labels.push(label);
    }
    Ok(labels)
}
