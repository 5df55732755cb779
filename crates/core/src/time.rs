//! Time helpers
//!
//! All durable timestamps are unix epoch milliseconds; in-memory code works
//! with `chrono::DateTime<Utc>`. These helpers are the single conversion
//! point between the two representations.

use chrono::{DateTime, TimeZone, Utc};

/// Current server time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a client-supplied epoch-milliseconds timestamp to server time.
///
/// A missing or out-of-range value falls back to "now"; location clients in
/// the field routinely omit the field or send garbage after a clock reset.
pub fn from_epoch_ms(epoch_ms: Option<i64>) -> DateTime<Utc> {
    match epoch_ms {
        Some(ms) => match Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(ts) => ts,
            _ => Utc::now(),
        },
        None => Utc::now(),
    }
}

/// Epoch milliseconds for a server timestamp.
pub fn to_epoch_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
