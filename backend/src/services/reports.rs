//! Crowd report intake and retrieval.

use chrono::{DateTime, Duration, Utc};

use super::error::{bounded, ServiceError, ServiceResult};
use super::stations::find_station;
use super::weather::WeatherSource;
use crate::api::{CreateReportRequest, CrowdLevel, CrowdReport, NewCrowdReport, StationId, User};
use crate::db::repository::FullRepository;

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const DEFAULT_REPORT_HOURS: i64 = 24;
pub const MAX_REPORT_HOURS: i64 = 720;
pub const DEFAULT_RECENT_LIMIT: i64 = 20;
pub const MAX_RECENT_LIMIT: i64 = 100;

/// Store a report from `user`, stamping it with the current weather at the
/// station when the weather source answers.
pub async fn create_report<R: FullRepository + ?Sized>(
    repo: &R,
    weather: &dyn WeatherSource,
    user: &User,
    request: &CreateReportRequest,
    now: DateTime<Utc>,
) -> ServiceResult<CrowdReport> {
    let crowd_level = CrowdLevel::new(request.crowd_level).map_err(ServiceError::Validation)?;

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    if let Some(d) = &description {
        if d.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ServiceError::validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }

    let station = find_station(repo, request.station_id).await?;
    let snapshot = weather.current(station.latitude, station.longitude).await;

    let report = repo
        .insert_report(&NewCrowdReport {
            station_id: station.id,
            user_id: user.id,
            crowd_level,
            description,
            temperature: snapshot.as_ref().map(|w| w.temperature),
            weather_condition: snapshot.map(|w| w.condition),
            created_at: now,
        })
        .await?;

    log::debug!(
        "User {} reported level {} at station {}",
        user.id,
        report.crowd_level,
        report.station_id
    );
    Ok(report)
}

/// Reports for a station from the last `hours` hours, newest first.
pub async fn station_reports<R: FullRepository + ?Sized>(
    repo: &R,
    station_id: StationId,
    hours: Option<i64>,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<CrowdReport>> {
    let hours = bounded("hours", hours, DEFAULT_REPORT_HOURS, 1, MAX_REPORT_HOURS)?;
    Ok(repo
        .reports_for_station_since(station_id, now - Duration::hours(hours))
        .await?)
}

/// Latest reports across all stations, newest first.
pub async fn recent_reports<R: FullRepository + ?Sized>(
    repo: &R,
    limit: Option<i64>,
) -> ServiceResult<Vec<CrowdReport>> {
    let limit = bounded("limit", limit, DEFAULT_RECENT_LIMIT, 1, MAX_RECENT_LIMIT)?;
    Ok(repo.recent_reports(limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NewStation, StationType, UserId};
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::StationRepository;
    use crate::services::weather::{FixedWeather, NoWeather, WeatherSnapshot};

    fn user() -> User {
        User {
            id: UserId::new(7),
            email: "u@example.com".to_string(),
            username: "rider".to_string(),
            hashed_password: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    async fn repo_with_station() -> (LocalRepository, StationId) {
        let repo = LocalRepository::new();
        let station = repo
            .create_station(&NewStation {
                name: "Central".to_string(),
                line: "Red".to_string(),
                latitude: 10.0,
                longitude: 20.0,
                station_type: StationType::Metro,
            })
            .await
            .unwrap();
        (repo, station.id)
    }

    fn request(station_id: StationId, level: i32, description: Option<&str>) -> CreateReportRequest {
        CreateReportRequest {
            station_id,
            crowd_level: level,
            description: description.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_report_captures_weather() {
        let (repo, station) = repo_with_station().await;
        let weather = FixedWeather(WeatherSnapshot::new(18.5, "Rain", 70.0));
        let report = create_report(&repo, &weather, &user(), &request(station, 4, Some(" busy ")), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.user_id, UserId::new(7));
        assert_eq!(report.description.as_deref(), Some("busy"));
        assert_eq!(report.temperature, Some(18.5));
        assert_eq!(report.weather_condition.as_deref(), Some("Rain"));
    }

    #[tokio::test]
    async fn test_report_validation() {
        let (repo, station) = repo_with_station().await;
        let now = Utc::now();
        for level in [0, 6] {
            let err = create_report(&repo, &NoWeather, &user(), &request(station, level, None), now)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }

        let long = "x".repeat(501);
        let err = create_report(&repo, &NoWeather, &user(), &request(station, 3, Some(&long)), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = create_report(&repo, &NoWeather, &user(), &request(StationId::new(99), 3, None), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(repo.report_count(), 0);
    }

    #[tokio::test]
    async fn test_station_and_recent_windows() {
        let (repo, station) = repo_with_station().await;
        let now = Utc::now();
        for (level, hours_ago) in [(1, 30), (2, 5), (3, 1)] {
            create_report(
                &repo,
                &NoWeather,
                &user(),
                &request(station, level, None),
                now - Duration::hours(hours_ago),
            )
            .await
            .unwrap();
        }

        let day = station_reports(&repo, station, None, now).await.unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].crowd_level.value(), 3);

        let recent = recent_reports(&repo, Some(1)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].crowd_level.value(), 3);

        assert!(station_reports(&repo, station, Some(721), now).await.is_err());
        assert!(recent_reports(&repo, Some(101)).await.is_err());
        assert!(station_reports(&repo, StationId::new(99), None, now)
            .await
            .unwrap()
            .is_empty());
    }
}
