pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use booking::{AppointmentBookingService, BookingRepositories};
pub use conflict::{candidate_window, find_conflict};
pub use lifecycle::{AppointmentLifecycleService, LifecycleRules};
