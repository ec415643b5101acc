//! Drive search query construction.
//!
//! Builds the `q` parameter for `files.list` from a container id and a
//! modification-time window:
//!
//! ```text
//! 'folder123' in parents and modifiedTime > '2024-01-01T00:00:00.000Z' and modifiedTime < '2024-01-15T00:00:00.000Z'
//! ```

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::types::error::GdrmError;
use crate::types::{SelectionCriteria, TimeWindow};

/// A well-formed Drive search expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveQuery(String);

impl DriveQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriveQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct QueryBuilder;

impl QueryBuilder {
    /// Build the search expression for files directly inside `container_id`
    /// modified strictly between the window bounds.
    pub fn build(container_id: &str, window: &TimeWindow) -> Result<DriveQuery, GdrmError> {
        if container_id.trim().is_empty() {
            return Err(GdrmError::InvalidCriteria(
                "container id must not be empty".to_string(),
            ));
        }
        // Compare at the precision written into the query.
        if window.start().trunc_subsecs(3) >= window.end().trunc_subsecs(3) {
            return Err(GdrmError::InvalidCriteria(
                "window start must precede window end".to_string(),
            ));
        }

        Ok(DriveQuery(format!(
            "{} in parents and modifiedTime > {} and modifiedTime < {}",
            quote(container_id),
            quote(&format_timestamp(window.start())),
            quote(&format_timestamp(window.end())),
        )))
    }

    pub fn build_from_criteria(criteria: &SelectionCriteria) -> Result<DriveQuery, GdrmError> {
        Self::build(criteria.container_id(), criteria.window())
    }
}

/// RFC 3339, UTC with an explicit `Z`, millisecond precision.
///
/// Drive records modification times in milliseconds, so this is exact for
/// the values it is compared against.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wrap a value in single quotes, escaping `\` and `'`.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}
