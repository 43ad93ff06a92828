//! In-memory local repository implementation.
//!
//! This module provides a document-style implementation of all repository
//! traits suitable for unit testing and local development. Every collection
//! is a `BTreeMap` keyed by id, so iteration order equals insertion order and
//! results are deterministic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::api::*;
use crate::db::repository::*;

/// In-memory local repository.
///
/// Cloning is cheap and clones share the same underlying data.
///
/// # Example
/// ```
/// use crowd_predictor::api::{NewStation, StationType};
/// use crowd_predictor::db::repositories::LocalRepository;
/// use crowd_predictor::db::repository::StationRepository;
///
/// # tokio_test_block(async {
/// let repo = LocalRepository::new();
/// let station = repo
///     .create_station(&NewStation {
///         name: "Central Station".to_string(),
///         line: "Red Line".to_string(),
///         latitude: 40.7128,
///         longitude: -74.0060,
///         station_type: StationType::Metro,
///     })
///     .await
///     .unwrap();
/// assert_eq!(repo.station_count(), 1);
/// assert_eq!(station.id.value(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    stations: BTreeMap<StationId, Station>,
    users: BTreeMap<UserId, User>,
    reports: BTreeMap<ReportId, CrowdReport>,
    predictions: BTreeMap<PredictionId, Prediction>,

    // ID counters
    next_station_id: i64,
    next_user_id: i64,
    next_report_id: i64,
    next_prediction_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            stations: BTreeMap::new(),
            users: BTreeMap::new(),
            reports: BTreeMap::new(),
            predictions: BTreeMap::new(),
            next_station_id: 1,
            next_user_id: 1,
            next_report_id: 1,
            next_prediction_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    ///
    /// While unhealthy every operation except `health_check` fails with a
    /// connection error.
    pub fn set_healthy(&self, healthy: bool) {
        if let Ok(mut data) = self.data.write() {
            data.is_healthy = healthy;
        }
    }

    /// Clear all data from the repository, keeping the health flag.
    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            *data = LocalData {
                is_healthy: data.is_healthy,
                ..Default::default()
            };
        }
    }

    /// Number of stored stations.
    pub fn station_count(&self) -> usize {
        self.data.read().map(|d| d.stations.len()).unwrap_or(0)
    }

    /// Number of stored reports.
    pub fn report_count(&self) -> usize {
        self.data.read().map(|d| d.reports.len()).unwrap_or(0)
    }

    /// Number of stored predictions.
    pub fn prediction_count(&self) -> usize {
        self.data.read().map(|d| d.predictions.len()).unwrap_or(0)
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(data: &LocalData) -> RepositoryResult<()> {
        if !data.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_newest_first(reports: &mut [CrowdReport]) {
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn in_window(created_at: DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.map_or(true, |s| created_at >= s)
}

#[async_trait]
impl StationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self.data.read()?;
        Ok(data.is_healthy)
    }

    async fn create_station(&self, station: &NewStation) -> RepositoryResult<Station> {
        let mut data = self.data.write()?;
        Self::check_health(&data)?;

        let id = StationId::new(data.next_station_id);
        data.next_station_id += 1;

        let stored = Station {
            id,
            name: station.name.clone(),
            line: station.line.clone(),
            latitude: station.latitude,
            longitude: station.longitude,
            station_type: station.station_type,
            created_at: Utc::now(),
            updated_at: None,
        };
        data.stations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_station(&self, station_id: StationId) -> RepositoryResult<Station> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        data.stations.get(&station_id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Station {} not found", station_id),
                ErrorContext::new("get_station")
                    .with_entity("station")
                    .with_entity_id(station_id),
            )
        })
    }

    async fn list_stations(&self, skip: i64, limit: i64) -> RepositoryResult<Vec<Station>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        Ok(data
            .stations
            .values()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_stations(&self) -> RepositoryResult<i64> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        Ok(data.stations.len() as i64)
    }
}

#[async_trait]
impl UserRepository for LocalRepository {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<User> {
        let mut data = self.data.write()?;
        Self::check_health(&data)?;

        if data
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(RepositoryError::conflict_with_context(
                "Email or username already registered",
                ErrorContext::new("create_user").with_entity("user"),
            ));
        }

        let id = UserId::new(data.next_user_id);
        data.next_user_id += 1;

        let stored = User {
            id,
            email: user.email.clone(),
            username: user.username.clone(),
            hashed_password: user.hashed_password.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        data.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        data.users.get(&user_id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("User {} not found", user_id),
                ErrorContext::new("get_user")
                    .with_entity("user")
                    .with_entity_id(user_id),
            )
        })
    }

    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        Ok(data
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<User>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        Ok(data
            .users
            .values()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }
}

#[async_trait]
impl ReportRepository for LocalRepository {
    async fn insert_report(&self, report: &NewCrowdReport) -> RepositoryResult<CrowdReport> {
        let mut data = self.data.write()?;
        Self::check_health(&data)?;

        if !data.stations.contains_key(&report.station_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("Station {} not found", report.station_id),
                ErrorContext::new("insert_report")
                    .with_entity("station")
                    .with_entity_id(report.station_id),
            ));
        }

        let id = ReportId::new(data.next_report_id);
        data.next_report_id += 1;

        let stored = CrowdReport {
            id,
            station_id: report.station_id,
            user_id: report.user_id,
            crowd_level: report.crowd_level,
            description: report.description.clone(),
            temperature: report.temperature,
            weather_condition: report.weather_condition.clone(),
            created_at: report.created_at,
        };
        data.reports.insert(id, stored.clone());
        Ok(stored)
    }

    async fn reports_for_station_since(
        &self,
        station_id: StationId,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<CrowdReport>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        let mut reports: Vec<CrowdReport> = data
            .reports
            .values()
            .filter(|r| r.station_id == station_id && r.created_at >= since)
            .cloned()
            .collect();
        sort_newest_first(&mut reports);
        Ok(reports)
    }

    async fn recent_reports(&self, limit: i64) -> RepositoryResult<Vec<CrowdReport>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        let mut reports: Vec<CrowdReport> = data.reports.values().cloned().collect();
        sort_newest_first(&mut reports);
        reports.truncate(limit.max(0) as usize);
        Ok(reports)
    }

    async fn all_reports(&self) -> RepositoryResult<Vec<CrowdReport>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        let mut reports: Vec<CrowdReport> = data.reports.values().cloned().collect();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(reports)
    }

    async fn count_reports(&self, since: Option<DateTime<Utc>>) -> RepositoryResult<i64> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        Ok(data
            .reports
            .values()
            .filter(|r| in_window(r.created_at, since))
            .count() as i64)
    }

    async fn station_averages(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Vec<StationAverage>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;

        let mut sums: BTreeMap<StationId, (i64, i64)> = BTreeMap::new();
        for report in data.reports.values() {
            if !in_window(report.created_at, since) {
                continue;
            }
            let entry = sums.entry(report.station_id).or_insert((0, 0));
            entry.0 += report.crowd_level.value() as i64;
            entry.1 += 1;
        }

        Ok(sums
            .into_iter()
            .map(|(station_id, (sum, count))| StationAverage {
                station_id,
                average_crowd: sum as f64 / count as f64,
                report_count: count,
            })
            .collect())
    }
}

#[async_trait]
impl PredictionRepository for LocalRepository {
    async fn insert_prediction(&self, prediction: &NewPrediction) -> RepositoryResult<Prediction> {
        let mut data = self.data.write()?;
        Self::check_health(&data)?;

        if !data.stations.contains_key(&prediction.station_id) {
            return Err(RepositoryError::not_found_with_context(
                format!("Station {} not found", prediction.station_id),
                ErrorContext::new("insert_prediction")
                    .with_entity("station")
                    .with_entity_id(prediction.station_id),
            ));
        }

        let id = PredictionId::new(data.next_prediction_id);
        data.next_prediction_id += 1;

        let stored = Prediction {
            id,
            station_id: prediction.station_id,
            predicted_crowd_level: prediction.predicted_crowd_level,
            confidence_score: prediction.confidence_score,
            prediction_time: prediction.prediction_time,
            created_at: prediction.created_at,
        };
        data.predictions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn predictions_for_station(
        &self,
        station_id: StationId,
        limit: i64,
    ) -> RepositoryResult<Vec<Prediction>> {
        let data = self.data.read()?;
        Self::check_health(&data)?;
        let mut predictions: Vec<Prediction> = data
            .predictions
            .values()
            .filter(|p| p.station_id == station_id)
            .cloned()
            .collect();
        predictions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        predictions.truncate(limit.max(0) as usize);
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn station(name: &str) -> NewStation {
        NewStation {
            name: name.to_string(),
            line: "Red Line".to_string(),
            latitude: 40.0,
            longitude: -74.0,
            station_type: StationType::Metro,
        }
    }

    fn report(station_id: StationId, level: i32, created_at: DateTime<Utc>) -> NewCrowdReport {
        NewCrowdReport {
            station_id,
            user_id: UserId::new(1),
            crowd_level: CrowdLevel::new(level).unwrap(),
            description: None,
            temperature: None,
            weather_condition: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_station_ids_are_sequential() {
        let repo = LocalRepository::new();
        let a = repo.create_station(&station("A")).await.unwrap();
        let b = repo.create_station(&station("B")).await.unwrap();
        assert_eq!(a.id, StationId::new(1));
        assert_eq!(b.id, StationId::new(2));
        assert_eq!(repo.count_stations().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_stations_pagination() {
        let repo = LocalRepository::new();
        for i in 0..5 {
            repo.create_station(&station(&format!("S{}", i))).await.unwrap();
        }
        let page = repo.list_stations(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "S1");
        assert_eq!(page[1].name, "S2");
        assert!(repo.list_stations(10, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_station_is_not_found() {
        let repo = LocalRepository::new();
        let err = repo.get_station(StationId::new(99)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_user_is_conflict() {
        let repo = LocalRepository::new();
        let user = NewUser {
            email: "a@example.com".to_string(),
            username: "alice".to_string(),
            hashed_password: "x".to_string(),
        };
        repo.create_user(&user).await.unwrap();

        let same_name = NewUser {
            email: "other@example.com".to_string(),
            ..user.clone()
        };
        let err = repo.create_user(&same_name).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));

        let found = repo
            .find_user_by_email_or_username("a@example.com", "nobody")
            .await
            .unwrap();
        assert_eq!(found.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_report_requires_station() {
        let repo = LocalRepository::new();
        let err = repo
            .insert_report(&report(StationId::new(5), 3, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reports_window_and_ordering() {
        let repo = LocalRepository::new();
        let s = repo.create_station(&station("A")).await.unwrap();
        let now = Utc::now();
        repo.insert_report(&report(s.id, 2, now - Duration::hours(30)))
            .await
            .unwrap();
        repo.insert_report(&report(s.id, 4, now - Duration::hours(2)))
            .await
            .unwrap();
        repo.insert_report(&report(s.id, 5, now - Duration::minutes(5)))
            .await
            .unwrap();

        let recent = repo
            .reports_for_station_since(s.id, now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].crowd_level.value(), 5);
        assert_eq!(recent[1].crowd_level.value(), 4);

        let all = repo.all_reports().await.unwrap();
        assert_eq!(all[0].crowd_level.value(), 2);

        assert_eq!(repo.count_reports(None).await.unwrap(), 3);
        assert_eq!(
            repo.count_reports(Some(now - Duration::hours(24)))
                .await
                .unwrap(),
            2
        );
        assert_eq!(repo.recent_reports(1).await.unwrap()[0].crowd_level.value(), 5);
    }

    #[tokio::test]
    async fn test_station_averages() {
        let repo = LocalRepository::new();
        let a = repo.create_station(&station("A")).await.unwrap();
        let b = repo.create_station(&station("B")).await.unwrap();
        let now = Utc::now();
        repo.insert_report(&report(a.id, 2, now)).await.unwrap();
        repo.insert_report(&report(a.id, 5, now)).await.unwrap();
        repo.insert_report(&report(b.id, 1, now - Duration::hours(3)))
            .await
            .unwrap();

        let all = repo.station_averages(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].station_id, a.id);
        assert_eq!(all[0].average_crowd, 3.5);
        assert_eq!(all[0].report_count, 2);

        let last_hour = repo
            .station_averages(Some(now - Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(last_hour.len(), 1);
        assert_eq!(last_hour[0].station_id, a.id);
    }

    #[tokio::test]
    async fn test_unhealthy_repository_rejects_operations() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        let err = repo.list_stations(0, 10).await.unwrap_err();
        assert!(err.is_retryable());
        repo.set_healthy(true);
        assert!(repo.list_stations(0, 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_predictions_newest_first_with_limit() {
        let repo = LocalRepository::new();
        let s = repo.create_station(&station("A")).await.unwrap();
        let now = Utc::now();
        for i in 0..3 {
            repo.insert_prediction(&NewPrediction {
                station_id: s.id,
                predicted_crowd_level: 2.0 + i as f64,
                confidence_score: 0.7,
                prediction_time: now,
                created_at: now + Duration::seconds(i),
            })
            .await
            .unwrap();
        }
        let preds = repo.predictions_for_station(s.id, 2).await.unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].predicted_crowd_level, 4.0);
        assert_eq!(preds[1].predicted_crowd_level, 3.0);
    }

    #[tokio::test]
    async fn test_clear_resets_counters() {
        let repo = LocalRepository::new();
        repo.create_station(&station("A")).await.unwrap();
        repo.clear();
        assert_eq!(repo.station_count(), 0);
        let again = repo.create_station(&station("B")).await.unwrap();
        assert_eq!(again.id, StationId::new(1));
    }
}
