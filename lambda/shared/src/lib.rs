//! Pieces shared by the `items` and `echo` Lambda handlers.
//!
//! - [`config`]: environment contract (table, region, index)
//! - [`store`]: the [`Table`] seam and its DynamoDB implementation
//! - [`convert`]: storage attribute → JSON adapter
//! - [`response`]: CORS headers, JSON responses and the invocation boundary
//! - [`error`]: error taxonomy mapped to HTTP status codes

pub mod config;
pub mod convert;
pub mod error;
pub mod response;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use config::Config;
pub use error::{ApiError, ConfigError, ConversionError, StoreError};
pub use store::{DynamoTable, Record, Table};

use chrono::{SecondsFormat, Utc};

/// Current UTC time as a fixed-width ISO-8601 string.
///
/// Fixed width keeps lexicographic order equal to chronological order, which the
/// `created_at` index sort key relies on.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fresh opaque identifier for a new record.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_fixed_width_utc() {
        let ts = timestamp();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000000Z".len());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_new_id_is_unique() {
        let a = new_id();
        let b = new_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
