//! Station listing, lookup and creation.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::error::{ServiceError, ServiceResult};
use crate::api::{NewStation, Station, StationId, StationSummary};
use crate::db::repository::{FullRepository, RepositoryError};
use crate::models::round2;

pub const DEFAULT_STATION_LIMIT: i64 = 100;
pub const MAX_STATION_LIMIT: i64 = 1000;

/// Window of reports that make up a station's "current" crowd level.
pub fn live_window() -> Duration {
    Duration::hours(1)
}

/// Fetch a station, mapping a missing one to a 404-style error.
pub async fn find_station<R: FullRepository + ?Sized>(
    repo: &R,
    station_id: StationId,
) -> ServiceResult<Station> {
    match repo.get_station(station_id).await {
        Ok(station) => Ok(station),
        Err(RepositoryError::NotFound { .. }) => Err(ServiceError::not_found("Station not found")),
        Err(e) => Err(e.into()),
    }
}

/// List stations with their current crowd level.
///
/// `limit` defaults to 100 and is capped at 1000.
pub async fn list_stations<R: FullRepository + ?Sized>(
    repo: &R,
    skip: Option<i64>,
    limit: Option<i64>,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<StationSummary>> {
    let skip = skip.unwrap_or(0);
    if skip < 0 {
        return Err(ServiceError::validation("skip must not be negative"));
    }
    let limit = limit.unwrap_or(DEFAULT_STATION_LIMIT);
    if limit < 1 {
        return Err(ServiceError::validation("limit must be at least 1"));
    }
    let limit = limit.min(MAX_STATION_LIMIT);

    let stations = repo.list_stations(skip, limit).await?;
    let live: HashMap<StationId, f64> = repo
        .station_averages(Some(now - live_window()))
        .await?
        .into_iter()
        .map(|avg| (avg.station_id, avg.average_crowd))
        .collect();

    Ok(stations
        .into_iter()
        .map(|station| {
            let current = live.get(&station.id).copied().map(round2);
            StationSummary {
                station,
                current_crowd_level: current,
            }
        })
        .collect())
}

/// Fetch one station with its current crowd level.
pub async fn get_station<R: FullRepository + ?Sized>(
    repo: &R,
    station_id: StationId,
    now: DateTime<Utc>,
) -> ServiceResult<StationSummary> {
    let station = find_station(repo, station_id).await?;
    let recent = repo
        .reports_for_station_since(station_id, now - live_window())
        .await?;
    let current_crowd_level = if recent.is_empty() {
        None
    } else {
        let sum: f64 = recent.iter().map(|r| r.crowd_level.as_f64()).sum();
        Some(round2(sum / recent.len() as f64))
    };
    Ok(StationSummary {
        station,
        current_crowd_level,
    })
}

/// Validate and store a new station.
pub async fn create_station<R: FullRepository + ?Sized>(
    repo: &R,
    request: &NewStation,
) -> ServiceResult<Station> {
    let station = NewStation {
        name: request.name.trim().to_string(),
        line: request.line.trim().to_string(),
        ..request.clone()
    };
    if station.name.is_empty() {
        return Err(ServiceError::validation("Station name must not be empty"));
    }
    if station.line.is_empty() {
        return Err(ServiceError::validation("Station line must not be empty"));
    }
    if !(-90.0..=90.0).contains(&station.latitude) {
        return Err(ServiceError::validation(
            "Latitude must be between -90 and 90",
        ));
    }
    if !(-180.0..=180.0).contains(&station.longitude) {
        return Err(ServiceError::validation(
            "Longitude must be between -180 and 180",
        ));
    }

    let created = repo.create_station(&station).await?;
    log::info!("Created station {} ({})", created.name, created.id);
    Ok(created)
}
