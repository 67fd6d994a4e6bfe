pub mod engine;

pub use engine::ClinicEngine;
