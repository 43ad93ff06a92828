//! Aggregate views over crowd reports.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

use super::error::{bounded, ServiceResult};
use super::stations::find_station;
use crate::api::{CrowdReport, CrowdedStation, StationAnalytics, StationId, SystemOverview};
use crate::db::repository::FullRepository;
use crate::models::round2;

pub const DEFAULT_ANALYTICS_DAYS: i64 = 7;
pub const MAX_ANALYTICS_DAYS: i64 = 365;
/// An hour is a peak when its average exceeds the overall one by this much.
pub const PEAK_MARGIN: f64 = 0.5;
pub const TOP_CROWDED_STATIONS: usize = 5;

/// Per-hour and overall statistics for one station over the last `days` days.
pub async fn station_analytics<R: FullRepository + ?Sized>(
    repo: &R,
    station_id: StationId,
    days: Option<i64>,
    now: DateTime<Utc>,
) -> ServiceResult<StationAnalytics> {
    let days = bounded("days", days, DEFAULT_ANALYTICS_DAYS, 1, MAX_ANALYTICS_DAYS)?;
    find_station(repo, station_id).await?;
    let reports = repo
        .reports_for_station_since(station_id, now - Duration::days(days))
        .await?;
    Ok(summarize(station_id, days, &reports))
}

/// Build analytics from an already fetched report list.
pub fn summarize(station_id: StationId, days: i64, reports: &[CrowdReport]) -> StationAnalytics {
    let mut by_hour: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for report in reports {
        let entry = by_hour.entry(report.created_at.hour()).or_insert((0.0, 0));
        entry.0 += report.crowd_level.as_f64();
        entry.1 += 1;
    }

    let total: f64 = reports.iter().map(|r| r.crowd_level.as_f64()).sum();
    let average = if reports.is_empty() {
        0.0
    } else {
        total / reports.len() as f64
    };

    let hour_means: Vec<(u32, f64)> = by_hour
        .into_iter()
        .map(|(hour, (sum, count))| (hour, sum / count as f64))
        .collect();

    let peak_hours = hour_means
        .iter()
        .filter(|(_, mean)| *mean >= average + PEAK_MARGIN)
        .map(|(hour, _)| *hour)
        .collect();

    let hourly_average = hour_means
        .iter()
        .map(|(hour, mean)| (hour.to_string(), round2(*mean)))
        .collect();

    StationAnalytics {
        station_id,
        period_days: days,
        total_reports: reports.len(),
        average_crowd_level: round2(average),
        peak_hours,
        hourly_average,
        max_crowd_level: reports.iter().map(|r| r.crowd_level.value()).max(),
        min_crowd_level: reports.iter().map(|r| r.crowd_level.value()).min(),
    }
}

/// System-wide counts and the most crowded stations by all-time average.
pub async fn system_overview<R: FullRepository + ?Sized>(
    repo: &R,
    now: DateTime<Utc>,
) -> ServiceResult<SystemOverview> {
    let total_stations = repo.count_stations().await?;
    let total_reports = repo.count_reports(None).await?;
    let reports_last_24h = repo.count_reports(Some(now - Duration::hours(24))).await?;

    let mut averages = repo.station_averages(None).await?;
    averages.sort_by(|a, b| {
        b.average_crowd
            .total_cmp(&a.average_crowd)
            .then(a.station_id.cmp(&b.station_id))
    });

    // Names are only needed for the top entries; unknown stations are skipped.
    let stations: HashMap<StationId, String> = repo
        .list_stations(0, total_stations.max(0))
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    let most_crowded_stations = averages
        .into_iter()
        .filter_map(|avg| {
            stations.get(&avg.station_id).map(|name| CrowdedStation {
                id: avg.station_id,
                name: name.clone(),
                average_crowd: round2(avg.average_crowd),
            })
        })
        .take(TOP_CROWDED_STATIONS)
        .collect();

    Ok(SystemOverview {
        total_stations,
        total_reports,
        reports_last_24h,
        most_crowded_stations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CrowdLevel, NewCrowdReport, NewStation, ReportId, StationType, UserId};
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::{ReportRepository, StationRepository};
    use crate::services::ServiceError;
    use chrono::TimeZone;

    fn report(level: i32, at: DateTime<Utc>) -> CrowdReport {
        CrowdReport {
            id: ReportId::new(1),
            station_id: StationId::new(1),
            user_id: UserId::new(1),
            crowd_level: CrowdLevel::new(level).unwrap(),
            description: None,
            temperature: None,
            weather_condition: None,
            created_at: at,
        }
    }

    #[test]
    fn test_summarize_empty() {
        let analytics = summarize(StationId::new(1), 7, &[]);
        assert_eq!(analytics.total_reports, 0);
        assert_eq!(analytics.average_crowd_level, 0.0);
        assert!(analytics.peak_hours.is_empty());
        assert!(analytics.hourly_average.is_empty());
        assert_eq!(analytics.max_crowd_level, None);
        let json = serde_json::to_value(&analytics).unwrap();
        assert!(json.get("max_crowd_level").is_none());
    }

    #[test]
    fn test_summarize_peaks() {
        let day = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let reports = vec![
            report(5, day + Duration::hours(8)),
            report(4, day + Duration::hours(8) + Duration::minutes(30)),
            report(1, day + Duration::hours(13)),
            report(2, day + Duration::hours(22)),
            report(1, day + Duration::hours(22)),
        ];
        let analytics = summarize(StationId::new(1), 7, &reports);
        // overall 13 / 5 = 2.6; hour 8 averages 4.5
        assert_eq!(analytics.average_crowd_level, 2.6);
        assert_eq!(analytics.peak_hours, vec![8]);
        assert_eq!(analytics.hourly_average["8"], 4.5);
        assert_eq!(analytics.hourly_average["22"], 1.5);
        assert_eq!(analytics.max_crowd_level, Some(5));
        assert_eq!(analytics.min_crowd_level, Some(1));
    }

    #[tokio::test]
    async fn test_station_analytics_requires_station() {
        let repo = LocalRepository::new();
        let err = station_analytics(&repo, StationId::new(3), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overview_ranks_stations() {
        let repo = LocalRepository::new();
        let now = Utc::now();
        let mut ids = Vec::new();
        for i in 0..7 {
            let s = repo
                .create_station(&NewStation {
                    name: format!("S{}", i),
                    line: "L".to_string(),
                    latitude: 0.0,
                    longitude: 0.0,
                    station_type: StationType::Bus,
                })
                .await
                .unwrap();
            ids.push(s.id);
        }
        // Station i gets level 1 + i % 5, one report two days ago for the first.
        for (i, id) in ids.iter().enumerate() {
            let at = if i == 0 { now - Duration::days(2) } else { now };
            repo.insert_report(&NewCrowdReport {
                station_id: *id,
                user_id: UserId::new(1),
                crowd_level: CrowdLevel::new(1 + (i as i32) % 5).unwrap(),
                description: None,
                temperature: None,
                weather_condition: None,
                created_at: at,
            })
            .await
            .unwrap();
        }

        let overview = system_overview(&repo, now).await.unwrap();
        assert_eq!(overview.total_stations, 7);
        assert_eq!(overview.total_reports, 7);
        assert_eq!(overview.reports_last_24h, 6);
        assert_eq!(overview.most_crowded_stations.len(), 5);
        let names: Vec<&str> = overview
            .most_crowded_stations
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["S4", "S3", "S2", "S1", "S6"]);
        assert_eq!(overview.most_crowded_stations[0].average_crowd, 5.0);
    }
}
