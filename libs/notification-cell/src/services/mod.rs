pub mod dispatcher;
pub mod notifier;
pub mod recipients;

pub use dispatcher::{NotificationDispatcher, NotificationWorkerPool};
pub use notifier::TracingNotifier;
pub use recipients::{ParticipantResolver, Participants};
