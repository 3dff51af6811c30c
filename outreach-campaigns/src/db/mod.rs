//! Database access for outreach-campaigns
//!
//! Campaign rows, per-contact rows and the append-only delivery log.
//! Timestamps are stored as RFC 3339 text.

pub mod campaigns;
pub mod contacts;
pub mod delivery_log;

use chrono::{DateTime, Utc};
use outreach_common::{Error, Result};

pub use outreach_common::db::init_database;

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(column, &s)).transpose()
}
