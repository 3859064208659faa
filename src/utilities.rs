use chrono::{DateTime, Utc};

/// Stream name used when none is configured: one stream per UTC day.
pub fn daily_stream_name(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d").to_string()
}
