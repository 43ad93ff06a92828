//! Feature extraction for crowd prediction.
//!
//! Turns a target time into calendar features and a time bucket, and a list
//! of past reports into summary statistics.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

use crate::api::CrowdReport;

/// Number of entries in [`TimeFeatures::regression_vector`].
pub const FEATURE_COUNT: usize = 6;

/// Minimum number of samples before a trend is computed.
pub const MIN_TREND_SAMPLES: usize = 4;

/// Coarse part of the week a target hour falls into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeBucket {
    /// Weekday 07:00-10:00
    MorningRush,
    /// Weekday 17:00-20:00
    EveningRush,
    /// Weekday 10:00-17:00
    Midday,
    /// Weekday, any other hour
    Night,
    /// Weekend 11:00-20:00
    WeekendDay,
    /// Weekend, any other hour
    WeekendQuiet,
}

impl TimeBucket {
    pub fn classify(hour: u32, is_weekend: bool) -> Self {
        if is_weekend {
            if (11..20).contains(&hour) {
                Self::WeekendDay
            } else {
                Self::WeekendQuiet
            }
        } else if (7..10).contains(&hour) {
            Self::MorningRush
        } else if (17..20).contains(&hour) {
            Self::EveningRush
        } else if (10..17).contains(&hour) {
            Self::Midday
        } else {
            Self::Night
        }
    }

    /// Typical crowd level for the bucket, used as the prior and as the
    /// fallback prediction.
    pub fn base_level(&self) -> f64 {
        match self {
            Self::MorningRush => 4.0,
            Self::EveningRush => 4.5,
            Self::Midday => 2.5,
            Self::Night => 1.5,
            Self::WeekendDay => 3.0,
            Self::WeekendQuiet => 2.0,
        }
    }

    pub fn is_rush(&self) -> bool {
        matches!(self, Self::MorningRush | Self::EveningRush)
    }
}

/// Calendar features of a target time (UTC).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeFeatures {
    /// 0-23
    pub hour: u32,
    /// Monday = 0
    pub weekday: u32,
    pub is_weekend: bool,
    pub bucket: TimeBucket,
}

impl TimeFeatures {
    pub fn from_time(time: DateTime<Utc>) -> Self {
        let hour = time.hour();
        let weekday = time.weekday().num_days_from_monday();
        let is_weekend = weekday >= 5;
        Self {
            hour,
            weekday,
            is_weekend,
            bucket: TimeBucket::classify(hour, is_weekend),
        }
    }

    /// `[1, sin(2πh/24), cos(2πh/24), weekend, morning rush, evening rush]`
    pub fn regression_vector(&self) -> [f64; FEATURE_COUNT] {
        let angle = 2.0 * PI * self.hour as f64 / 24.0;
        [
            1.0,
            angle.sin(),
            angle.cos(),
            flag(self.is_weekend),
            flag(self.bucket == TimeBucket::MorningRush),
            flag(self.bucket == TimeBucket::EveningRush),
        ]
    }

    pub fn time_of_day(&self) -> &'static str {
        if self.bucket.is_rush() {
            "rush"
        } else {
            "normal"
        }
    }

    pub fn day_type(&self) -> &'static str {
        if self.is_weekend {
            "weekend"
        } else {
            "weekday"
        }
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Summary of a station's recent reports relative to a target hour.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalStats {
    pub samples: usize,
    pub overall_mean: Option<f64>,
    /// Mean of reports made during the target hour of day.
    pub hour_mean: Option<f64>,
    pub hour_samples: usize,
    /// Newer-half mean minus older-half mean.
    pub trend: Option<f64>,
}

impl HistoricalStats {
    pub fn from_reports(reports: &[CrowdReport], target_hour: u32) -> Self {
        let samples: Vec<(f64, DateTime<Utc>)> = reports
            .iter()
            .map(|r| (r.crowd_level.as_f64(), r.created_at))
            .collect();
        Self::from_samples(&samples, target_hour)
    }

    /// Build statistics from `(crowd level, reported at)` pairs in any order.
    pub fn from_samples(samples: &[(f64, DateTime<Utc>)], target_hour: u32) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut ordered = samples.to_vec();
        ordered.sort_by_key(|(_, at)| *at);

        let at_hour: Vec<f64> = ordered
            .iter()
            .filter(|(_, at)| at.hour() == target_hour)
            .map(|(level, _)| *level)
            .collect();

        let trend = if ordered.len() >= MIN_TREND_SAMPLES {
            let (older, newer) = ordered.split_at(ordered.len() / 2);
            match (
                mean(older.iter().map(|(l, _)| *l)),
                mean(newer.iter().map(|(l, _)| *l)),
            ) {
                (Some(old), Some(new)) => Some(new - old),
                _ => None,
            }
        } else {
            None
        };

        Self {
            samples: ordered.len(),
            overall_mean: mean(ordered.iter().map(|(l, _)| *l)),
            hour_mean: mean(at_hour.iter().copied()),
            hour_samples: at_hour.len(),
            trend,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }
}
