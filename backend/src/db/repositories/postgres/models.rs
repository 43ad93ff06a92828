use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double};

use super::schema::{crowd_reports, predictions, stations, users};
use crate::api::{
    CrowdLevel, CrowdReport, NewCrowdReport, NewPrediction, NewStation, NewUser, Prediction,
    PredictionId, ReportId, Station, StationAverage, StationId, User, UserId,
};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = stations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StationRow {
    pub id: i64,
    pub name: String,
    pub line: String,
    pub latitude: f64,
    pub longitude: f64,
    pub station_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stations)]
pub struct NewStationRow {
    pub name: String,
    pub line: String,
    pub latitude: f64,
    pub longitude: f64,
    pub station_type: String,
}

impl From<&NewStation> for NewStationRow {
    fn from(station: &NewStation) -> Self {
        Self {
            name: station.name.clone(),
            line: station.line.clone(),
            latitude: station.latitude,
            longitude: station.longitude,
            station_type: station.station_type.as_str().to_string(),
        }
    }
}

impl TryFrom<StationRow> for Station {
    type Error = RepositoryError;

    fn try_from(row: StationRow) -> RepositoryResult<Self> {
        let station_type = row.station_type.parse().map_err(|e: String| {
            RepositoryError::internal_with_context(
                e,
                ErrorContext::new("decode_station")
                    .with_entity("station")
                    .with_entity_id(row.id),
            )
        })?;
        Ok(Station {
            id: StationId(row.id),
            name: row.name,
            line: row.line,
            latitude: row.latitude,
            longitude: row.longitude,
            station_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub email: String,
    pub username: String,
    pub hashed_password: String,
}

impl From<&NewUser> for NewUserRow {
    fn from(user: &NewUser) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            hashed_password: user.hashed_password.clone(),
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            email: row.email,
            username: row.username,
            hashed_password: row.hashed_password,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crowd_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CrowdReportRow {
    pub id: i64,
    pub station_id: i64,
    pub user_id: i64,
    pub crowd_level: i32,
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub weather_condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crowd_reports)]
pub struct NewCrowdReportRow {
    pub station_id: i64,
    pub user_id: i64,
    pub crowd_level: i32,
    pub description: Option<String>,
    pub temperature: Option<f64>,
    pub weather_condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&NewCrowdReport> for NewCrowdReportRow {
    fn from(report: &NewCrowdReport) -> Self {
        Self {
            station_id: report.station_id.value(),
            user_id: report.user_id.value(),
            crowd_level: report.crowd_level.value(),
            description: report.description.clone(),
            temperature: report.temperature,
            weather_condition: report.weather_condition.clone(),
            created_at: report.created_at,
        }
    }
}

impl TryFrom<CrowdReportRow> for CrowdReport {
    type Error = RepositoryError;

    fn try_from(row: CrowdReportRow) -> RepositoryResult<Self> {
        let crowd_level = CrowdLevel::new(row.crowd_level).map_err(|e| {
            RepositoryError::internal_with_context(
                e,
                ErrorContext::new("decode_report")
                    .with_entity("crowd_report")
                    .with_entity_id(row.id),
            )
        })?;
        Ok(CrowdReport {
            id: ReportId(row.id),
            station_id: StationId(row.station_id),
            user_id: UserId(row.user_id),
            crowd_level,
            description: row.description,
            temperature: row.temperature,
            weather_condition: row.weather_condition,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = predictions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PredictionRow {
    pub id: i64,
    pub station_id: i64,
    pub predicted_crowd_level: f64,
    pub confidence_score: f64,
    pub prediction_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = predictions)]
pub struct NewPredictionRow {
    pub station_id: i64,
    pub predicted_crowd_level: f64,
    pub confidence_score: f64,
    pub prediction_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&NewPrediction> for NewPredictionRow {
    fn from(prediction: &NewPrediction) -> Self {
        Self {
            station_id: prediction.station_id.value(),
            predicted_crowd_level: prediction.predicted_crowd_level,
            confidence_score: prediction.confidence_score,
            prediction_time: prediction.prediction_time,
            created_at: prediction.created_at,
        }
    }
}

impl From<PredictionRow> for Prediction {
    fn from(row: PredictionRow) -> Self {
        Prediction {
            id: PredictionId(row.id),
            station_id: StationId(row.station_id),
            predicted_crowd_level: row.predicted_crowd_level,
            confidence_score: row.confidence_score,
            prediction_time: row.prediction_time,
            created_at: row.created_at,
        }
    }
}

/// Row produced by the per-station aggregate query.
#[derive(Debug, Clone, QueryableByName)]
pub struct StationAverageRow {
    #[diesel(sql_type = BigInt)]
    pub station_id: i64,
    #[diesel(sql_type = Double)]
    pub average_crowd: f64,
    #[diesel(sql_type = BigInt)]
    pub report_count: i64,
}

impl From<StationAverageRow> for StationAverage {
    fn from(row: StationAverageRow) -> Self {
        StationAverage {
            station_id: StationId(row.station_id),
            average_crowd: row.average_crowd,
            report_count: row.report_count,
        }
    }
}
