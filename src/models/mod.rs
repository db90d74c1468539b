pub mod booking;
pub mod movie;
pub mod show;
pub mod theater;
pub mod user;

pub use booking::{Booking, NewBooking, ShowReport};
pub use movie::{Movie, MovieInput};
pub use show::{NewShow, Occupancy, Show};
pub use theater::{Theater, TheaterFilter, TheaterInput, TheaterPage};
pub use user::User;
