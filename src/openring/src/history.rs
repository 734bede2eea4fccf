use std::time::Duration;

use chrono::{DateTime, Utc};
use openring_codec::{HeartRateLog, RingError, SportDetailLog};
use thiserror::Error;

use crate::helpers::dates;

/// Inclusive range of calendar days for a multi-day download.
///
/// Construction normalizes both ends to their day start and rejects an
/// inverted range before any request goes out. Zone-less user input never
/// reaches this type; the CLI converts it explicitly first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        let start = dates::start_of_day(start);
        let end = dates::start_of_day(end);
        if start > end {
            return Err(WindowError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn days(&self) -> Vec<DateTime<Utc>> {
        dates::days_between(self.start, self.end)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("window start {start} is after end {end}")]
pub struct WindowError {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Why one day of a range download failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("link closed mid-exchange")]
    LinkClosed,
    #[error(transparent)]
    Protocol(#[from] RingError),
    #[error("log ended after {received_samples} samples, {expected_frames} frames were declared")]
    Incomplete {
        expected_frames: usize,
        received_samples: usize,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("day is {0} days back, the wire format addresses at most 255")]
    Unsupported(i64),
    #[error("decoder produced unrelated data")]
    UnexpectedData,
}

/// What a single day of a range download produced. `NoData` is a normal
/// outcome, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DayLog<T> {
    NoData,
    Log(T),
}

#[derive(Debug)]
pub struct DayRecord<T> {
    pub day: DateTime<Utc>,
    pub result: Result<DayLog<T>, FetchError>,
}

/// Per-day outcomes for a whole window, in ascending day order. Failed days
/// stay visible next to the collected ones so the caller can retry just
/// those.
#[derive(Debug)]
pub struct RangeDownload<T> {
    pub days: Vec<DayRecord<T>>,
}

impl<T: LogSamples> RangeDownload<T> {
    /// Flattens completed logs into exportable rows. NoData and failed days
    /// contribute nothing; zero-valued readings stay in.
    pub fn rows(&self) -> Vec<(DateTime<Utc>, i64)> {
        let mut rows = Vec::new();
        for record in &self.days {
            if let Ok(DayLog::Log(log)) = &record.result {
                rows.extend(log.rows());
            }
        }
        rows
    }

    pub fn failed_days(&self) -> impl Iterator<Item = &DayRecord<T>> {
        self.days.iter().filter(|record| record.result.is_err())
    }
}

/// Flattening of one completed log into `(instant, value)` rows.
pub trait LogSamples {
    fn rows(&self) -> Vec<(DateTime<Utc>, i64)>;
}

impl LogSamples for HeartRateLog {
    fn rows(&self) -> Vec<(DateTime<Utc>, i64)> {
        self.samples_with_times()
            .map(|(instant, sample)| (instant, i64::from(sample)))
            .collect()
    }
}

impl LogSamples for SportDetailLog {
    fn rows(&self) -> Vec<(DateTime<Utc>, i64)> {
        self.details
            .iter()
            .filter_map(|detail| {
                detail
                    .timestamp()
                    .map(|instant| (instant, i64::from(detail.steps)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn window_normalizes_to_day_starts() {
        let window = DateWindow::new(at(2025, 11, 1, 15), at(2025, 11, 12, 3)).unwrap();

        assert_eq!(window.start(), at(2025, 11, 1, 0));
        assert_eq!(window.end(), at(2025, 11, 12, 0));
        assert_eq!(window.days().len(), 12);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let result = DateWindow::new(at(2025, 11, 12, 0), at(2025, 11, 1, 0));
        assert!(result.is_err());
    }

    #[test]
    fn same_day_window_is_fine() {
        let window = DateWindow::new(at(2025, 11, 12, 9), at(2025, 11, 12, 1)).unwrap();
        assert_eq!(window.days(), vec![at(2025, 11, 12, 0)]);
    }

    #[test]
    fn rows_skip_failed_days_but_keep_zeros() {
        let log = HeartRateLog {
            timestamp: at(2025, 11, 1, 0),
            interval_minutes: 5,
            samples: vec![70, 0, 72],
        };
        let download = RangeDownload {
            days: vec![
                DayRecord {
                    day: at(2025, 11, 1, 0),
                    result: Ok(DayLog::Log(log)),
                },
                DayRecord {
                    day: at(2025, 11, 2, 0),
                    result: Ok(DayLog::NoData),
                },
                DayRecord {
                    day: at(2025, 11, 3, 0),
                    result: Err(FetchError::LinkClosed),
                },
            ],
        };

        let rows = download.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], (at(2025, 11, 1, 0) + chrono::TimeDelta::minutes(5), 0));
        assert_eq!(download.failed_days().count(), 1);
    }
}
