//! Binary reports: PDF receipts and Excel exports.

pub mod export;
pub mod receipt;

use chrono::{DateTime, Utc};

/// `DD Mon YYYY HH:MM UTC`, or a dash for a missing timestamp
pub(crate) fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%d %b %Y %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
