// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epoch-millisecond formatting helpers shared by task and history writers.

use chrono::{DateTime, Utc};

fn to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms as i64).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Render an epoch-millisecond timestamp as RFC3339 (`2026-01-01T00:00:00Z`).
pub fn format_epoch_ms(ms: u64) -> String {
    to_datetime(ms).to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Render an epoch-millisecond timestamp as `YYYY-MM`, used to name monthly
/// history files.
pub fn epoch_ms_to_year_month(ms: u64) -> String {
    to_datetime(ms).format("%Y-%m").to_string()
}

/// Parse an RFC3339 timestamp (as stored in `Task::last_activity` and
/// friends) back to epoch milliseconds. Returns `None` on malformed input
/// rather than erroring, since callers treat a bad timestamp as "unknown".
pub fn parse_epoch_ms(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_ms_as_rfc3339() {
        assert_eq!(format_epoch_ms(1_735_689_600_000), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn formats_year_month() {
        assert_eq!(epoch_ms_to_year_month(1_735_689_600_000), "2025-01");
    }

    #[test]
    fn parse_epoch_ms_round_trips_format_epoch_ms() {
        let formatted = format_epoch_ms(1_735_689_600_000);
        assert_eq!(parse_epoch_ms(&formatted), Some(1_735_689_600_000));
    }

    #[test]
    fn parse_epoch_ms_rejects_garbage() {
        assert_eq!(parse_epoch_ms("not a timestamp"), None);
    }
}
