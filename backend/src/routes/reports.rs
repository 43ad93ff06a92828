use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CrowdLevel, ReportId, StationId, UserId};

/// A user-submitted crowd observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdReport {
    pub id: ReportId,
    pub station_id: StationId,
    pub user_id: UserId,
    pub crowd_level: CrowdLevel,
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub weather_condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated report ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCrowdReport {
    pub station_id: StationId,
    pub user_id: UserId,
    pub crowd_level: CrowdLevel,
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub weather_condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Report submission body. The crowd level is validated by the service so an
/// out-of-range value yields a 400 rather than a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReportRequest {
    pub station_id: StationId,
    pub crowd_level: i32,
    #[serde(default)]
    pub description: Option<String>,
}

pub const CROWD_REPORTS: &str = "/api/crowd-reports";
pub const STATION_REPORTS: &str = "/api/crowd-reports/station/{station_id}";
pub const RECENT_REPORTS: &str = "/api/crowd-reports/recent";
