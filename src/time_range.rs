use crate::error::MetricsDashboardError;
use chrono::{DateTime, Duration, Utc};
use std::convert::TryFrom;

const WINDOW_HOURS: i64 = 12;
const CLOUD_WATCH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Trailing window ending at the instant it was built from.
#[derive(Debug, PartialEq)]
pub struct TimeRange {
    pub start: chrono::DateTime<Utc>,
    pub end: chrono::DateTime<Utc>,
}

impl TryFrom<DateTime<Utc>> for TimeRange {
    type Error = MetricsDashboardError;

    fn try_from(end: DateTime<Utc>) -> Result<Self, Self::Error> {
        let start = end
            .checked_sub_signed(Duration::hours(WINDOW_HOURS))
            .ok_or(MetricsDashboardError::NoneValue)?;
        Ok(TimeRange { start, end })
    }
}

impl TimeRange {
    pub fn start_time(&self) -> String {
        self.start.format(CLOUD_WATCH_TIME_FORMAT).to_string()
    }

    pub fn end_time(&self) -> String {
        self.end.format(CLOUD_WATCH_TIME_FORMAT).to_string()
    }
}
