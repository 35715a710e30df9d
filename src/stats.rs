//! Day keys for the daily statistics counters.
//!
//! Counters are bucketed by the local calendar day at the moment of the
//! increment, formatted `DD-MM-YYYY`. No timezone normalization is applied:
//! the host's local time decides which bucket an event lands in.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Format `at` as a `DD-MM-YYYY` counter field in its own timezone
pub fn day_key<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d-%m-%Y").to_string()
}

/// Counter field for the current local day
pub fn today() -> String {
    day_key(&Local::now())
}
