//! Directory generalized-time parsing.
//!
//! Directory servers report modification times as `YYYYMMDDHHMMSSZ`. Active
//! Directory appends a fractional part (`20230115093000.0Z`), which is
//! accepted and kept as sub-second precision.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::TimestampError;

/// `YYYYMMDDHHMMSS`, an optional `.fraction`, then the `Z` zone marker.
const GENERALIZED_TIME: &str = "%Y%m%d%H%M%S%.fZ";

/// Width of the `YYYYMMDDHHMMSS` prefix.
const DIGITS: usize = 14;

/// Parse a directory timestamp into a UTC point in time.
///
/// The `.` fraction is handled by chrono's `%.f`. Generalized time also
/// allows a `,` separator, which chrono does not know, so a comma is
/// rewritten to `.` by hand before parsing. The prefix is checked for exactly
/// 14 digits first because chrono would accept narrower fields.
pub fn parse_directory_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let malformed = |detail: String| TimestampError::Malformed {
        value: value.to_string(),
        detail,
    };

    let prefix = value.get(..DIGITS).unwrap_or(value);
    if prefix.len() != DIGITS || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("expected 14 digits YYYYMMDDHHMMSS".into()));
    }

    let normalized = match value[DIGITS..].strip_prefix(',') {
        Some(rest) => Cow::Owned(format!("{}.{}", prefix, rest)),
        None => Cow::Borrowed(value),
    };

    NaiveDateTime::parse_from_str(&normalized, GENERALIZED_TIME)
        .map(|naive| naive.and_utc())
        .map_err(|e| malformed(e.to_string()))
}
