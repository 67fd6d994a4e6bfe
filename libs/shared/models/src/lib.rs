pub mod appointment;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod interval;
pub mod notification;
pub mod schedule;
