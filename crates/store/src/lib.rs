//! Durable storage for CourierCore aggregates
//!
//! SQLite-backed store for sessions, assignments, parcel links, and location
//! samples. Every status transition is read-validate-write inside a single
//! transaction, so concurrent writers on the same aggregate resolve to one
//! winner and typed conflict errors for the losers.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::DeliveryStore;
