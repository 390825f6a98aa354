use chrono::{DateTime, Utc};

/// Render a timestamp for player-facing views: `YYYY-MM-DD HH:MM:SS UTC`,
/// no subsecond digits.
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
