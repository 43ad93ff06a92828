use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{StationId, StationType};

/// A transit station as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub line: String,
    pub latitude: f64,
    pub longitude: f64,
    pub station_type: StationType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Station fields supplied on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStation {
    pub name: String,
    pub line: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub station_type: StationType,
}

/// Station annotated with the live crowd level (average of the last hour).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    #[serde(flatten)]
    pub station: Station,
    pub current_crowd_level: Option<f64>,
}

pub const STATIONS: &str = "/api/stations";
pub const STATION: &str = "/api/stations/{station_id}";
