//! Core functionality for the CourierCore delivery coordination system.
//!
//! This crate provides the error classification, logging setup, and time
//! utilities shared across the CourierCore ecosystem.

pub mod error;
pub mod logging;
pub mod time;

pub use error::ErrorKind;
pub use time::{from_epoch_ms, now, to_epoch_ms};
