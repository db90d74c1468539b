pub mod availability;
pub mod reports;
pub mod reservation;

pub use availability::check_availability;
pub use reservation::Reservations;
