pub mod error;
pub mod models;
pub mod services;

pub use error::DispatchError;
pub use models::*;
pub use services::*;
