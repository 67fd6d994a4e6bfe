pub mod error;
pub mod memory;
pub mod repository;

pub use error::DatabaseError;
pub use memory::InMemoryDatabase;
pub use repository::*;
