//! Small formatting helpers for the query log.

use std::time::Duration;

/// Quotes a SQL string for logging, escaping quotes, backslashes, and
/// control characters so the log line stays on one line.
pub fn quote_query(sql: &str) -> String {
    format!("\"{}\"", sql.escape_debug())
}

/// Renders a duration in its largest non-zero unit among s/ms/µs/ns.
pub fn duration_string(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos >= 1_000_000_000 {
        format!("{:.2}s", nanos as f64 / 1e9)
    } else if nanos >= 1_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else if nanos >= 1_000 {
        format!("{:.2}µs", nanos as f64 / 1e3)
    } else {
        format!("{nanos}ns")
    }
}
