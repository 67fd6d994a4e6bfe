pub mod scanner;

pub use scanner::{ReminderScanner, ReminderScannerHandle};
