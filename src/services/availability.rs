use tracing::warn;

use crate::models::show::parse_seat_label;
use crate::store::ShowStore;

/// Advisory check: `true` only if the show exists and every requested seat
/// is currently free. Reserves nothing; the commit re-checks under lock.
///
/// Unknown shows, malformed labels, an empty request and store failures all
/// answer `false`.
pub async fn check_availability<S>(store: &S, show_id: i64, seats: &[String]) -> bool
where
    S: ShowStore + ?Sized,
{
    if seats.is_empty() {
        return false;
    }
    let Ok(labels) = seats
        .iter()
        .map(|s| parse_seat_label(s))
        .collect::<Result<Vec<_>, _>>()
    else {
        return false;
    };

    match store.show(show_id).await {
        Ok(Some(show)) => show.occupied_seats.all_free(&labels),
        Ok(None) => false,
        Err(e) => {
            warn!("availability check for show {} failed: {}", show_id, e);
            false
        }
    }
}
