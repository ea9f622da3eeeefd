use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::debug;

use crate::timestamp::parse_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElapsedReport {
    NoRecords,
    Unreadable,
    Since(Duration),
}

impl fmt::Display for ElapsedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecords => f.write_str("No records"),
            Self::Unreadable => f.write_str("Could not read date"),
            Self::Since(elapsed) => {
                let total_minutes = elapsed.num_minutes().max(0);
                write!(f, "{}:{:02}", total_minutes / 60, total_minutes % 60)
            }
        }
    }
}

/// Time since the most recent event. Parse failures are reported, never raised.
pub fn since_last(events: &[String], now_utc: DateTime<Utc>, offset: FixedOffset) -> ElapsedReport {
    let Some(last) = events.last() else {
        return ElapsedReport::NoRecords;
    };

    match parse_token(last, now_utc, offset) {
        Ok(recorded_at) => ElapsedReport::Since(now_utc - recorded_at),
        Err(err) => {
            debug!(token = %last, "could not parse last event: {err}");
            ElapsedReport::Unreadable
        }
    }
}
