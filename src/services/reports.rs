//! Read-side aggregation for the admin back office and booking listings.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::AppResult;
use crate::models::{Booking, Movie, Show, ShowReport, Theater, TheaterFilter};
use crate::store::{BookingStore, MovieStore, ShowStore, Store, TheaterStore, UserStore};

/// A show with its movie resolved, as the client renders it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowDetails {
    #[serde(flatten)]
    pub show: Show,
    pub movie: Option<Movie>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowWithReport {
    #[serde(flatten)]
    pub details: ShowDetails,
    pub report: ShowReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub show: Option<ShowDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_bookings: usize,
    pub total_revenue: f64,
    pub active_shows: Vec<ShowDetails>,
    pub total_user: i64,
    pub total_theaters: i64,
    pub theaters: Vec<Theater>,
}

pub async fn with_movies(store: &dyn Store, shows: Vec<Show>) -> AppResult<Vec<ShowDetails>> {
    let ids: Vec<i64> = shows.iter().map(|s| s.movie_id).collect();
    let movies: HashMap<i64, Movie> = store
        .movies_by_ids(&ids)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    Ok(shows
        .into_iter()
        .map(|show| {
            let movie = movies.get(&show.movie_id).cloned();
            ShowDetails { show, movie }
        })
        .collect())
}

/// Bookings with their show and movie, preserving the input order.
pub async fn with_shows(store: &dyn Store, bookings: Vec<Booking>) -> AppResult<Vec<BookingDetails>> {
    let mut show_ids: Vec<i64> = bookings.iter().map(|b| b.show_id).collect();
    show_ids.sort_unstable();
    show_ids.dedup();

    let shows: Vec<Show> = try_join_all(show_ids.iter().map(|id| store.show(*id)))
        .await?
        .into_iter()
        .flatten()
        .collect();
    let shows: HashMap<i64, ShowDetails> = with_movies(store, shows)
        .await?
        .into_iter()
        .map(|d| (d.show.id, d))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|booking| {
            let show = shows.get(&booking.show_id).cloned();
            BookingDetails { booking, show }
        })
        .collect())
}

pub async fn show_report(store: &dyn Store, show: &Show) -> AppResult<ShowReport> {
    let bookings = store.bookings_for_show(show.id).await?;
    Ok(ShowReport::new(&bookings, show.occupied_seats.len(), show.show_price))
}

pub async fn upcoming_with_reports(store: &dyn Store, now: DateTime<Utc>) -> AppResult<Vec<ShowWithReport>> {
    let shows = with_movies(store, store.upcoming_shows(now).await?).await?;
    let reports = try_join_all(shows.iter().map(|d| show_report(store, &d.show))).await?;
    Ok(shows
        .into_iter()
        .zip(reports)
        .map(|(details, report)| ShowWithReport { details, report })
        .collect())
}

pub async fn dashboard(store: &dyn Store, now: DateTime<Utc>) -> AppResult<Dashboard> {
    let featured = TheaterFilter {
        search: None,
        is_active: Some(true),
        page: 1,
        limit: 6,
    };

    let (paid, upcoming, total_user, total_theaters, theaters) = tokio::try_join!(
        store.paid_bookings(),
        store.upcoming_shows(now),
        store.count_users(),
        store.count_active_theaters(),
        store.list_theaters(&featured),
    )?;

    Ok(Dashboard {
        total_bookings: paid.len(),
        total_revenue: paid.iter().map(|b| b.amount).sum(),
        active_shows: with_movies(store, upcoming).await?,
        total_user,
        total_theaters,
        theaters: theaters.theaters,
    })
}
