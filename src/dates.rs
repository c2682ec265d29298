use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{HarnessError, Result};

/// Date formats tried in order by [`adjust_dates`].
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the split `Date` + `Time` columns some data vendors export.
pub const DATE_TIME_COLUMNS_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Parse a date trying each of [`DATE_FORMATS`] in order.
pub fn adjust_dates(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| HarnessError::DateParse {
            input: input.to_string(),
            formats: DATE_FORMATS.to_vec(),
        })
}

pub fn adjust_datetime(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), DATETIME_FORMAT).map_err(|_| {
        HarnessError::DateParse {
            input: input.to_string(),
            formats: vec![DATETIME_FORMAT],
        }
    })
}

/// Join a `Date` and a `Time` cell into one timestamp.
pub fn create_datetime(date: &str, time: &str) -> Result<NaiveDateTime> {
    let joined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&joined, DATE_TIME_COLUMNS_FORMAT).map_err(|_| {
        HarnessError::DateParse {
            input: joined.clone(),
            formats: vec![DATE_TIME_COLUMNS_FORMAT],
        }
    })
}

/// Parse a timestamp cell of unknown shape.
///
/// Tries the full datetime format first, then ISO `T`-separated, and finally
/// falls back to a bare date at midnight.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
    if let Ok(ts) = adjust_datetime(input) {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts);
    }
    adjust_dates(input)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| HarnessError::DateParse {
            input: input.to_string(),
            formats: [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S"]
                .into_iter()
                .chain(DATE_FORMATS)
                .collect(),
        })
}

pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    let trimmed = input.trim();
    ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| HarnessError::DateParse {
            input: input.to_string(),
            formats: vec!["%H:%M", "%H:%M:%S"],
        })
}

/// Inclusive time-of-day window applied to every trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start_time: NaiveTime,
    pub eod_time: NaiveTime,
    /// Hours pulled in ahead of `start_time` so setups forming just before
    /// the session are still seen.
    pub subtract_hours: i64,
}

impl SessionWindow {
    pub fn effective_start(&self) -> NaiveTime {
        // NaiveTime arithmetic wraps around midnight.
        self.start_time - Duration::hours(self.subtract_hours)
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        let t = ts.time();
        t >= self.effective_start() && t <= self.eod_time
    }

    /// Row mask for [`crate::table::WorkingTable::filter`].
    pub fn mask(&self, timestamps: &[NaiveDateTime]) -> Vec<bool> {
        timestamps.iter().map(|ts| self.contains(ts)).collect()
    }
}
