pub mod availability;
pub mod schedule;
pub mod slots;

pub use availability::{resolve, AvailabilityService};
pub use schedule::ScheduleService;
pub use slots::{generate_slots, Slots};
