use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::StationId;

/// Per-station aggregate returned by the repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationAverage {
    pub station_id: StationId,
    pub average_crowd: f64,
    pub report_count: i64,
}

/// Historical analytics for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationAnalytics {
    pub station_id: StationId,
    pub period_days: i64,
    pub total_reports: usize,
    pub average_crowd_level: f64,
    pub peak_hours: Vec<u32>,
    /// Average crowd level keyed by hour of day ("0".."23").
    pub hourly_average: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_crowd_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_crowd_level: Option<i32>,
}

/// Entry of the most-crowded ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdedStation {
    pub id: StationId,
    pub name: String,
    pub average_crowd: f64,
}

/// System-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_stations: i64,
    pub total_reports: i64,
    pub reports_last_24h: i64,
    pub most_crowded_stations: Vec<CrowdedStation>,
}

pub const STATION_ANALYTICS: &str = "/api/analytics/station/{station_id}";
pub const OVERVIEW: &str = "/api/analytics/overview";
pub const SYSTEM: &str = "/api/analytics/system";
