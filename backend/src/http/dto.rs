//! Data transfer objects for HTTP API responses and query strings.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Plain message body, used by the root endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `?skip=&limit=` for station listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// `?hours=` for report windows and hourly forecasts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}
