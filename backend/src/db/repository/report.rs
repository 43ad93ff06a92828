//! Crowd report repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::api::{CrowdReport, NewCrowdReport, StationAverage, StationId};

/// Repository trait for crowd reports and the aggregates computed over them.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Insert a report.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the referenced station does not exist
    async fn insert_report(&self, report: &NewCrowdReport) -> RepositoryResult<CrowdReport>;

    /// Reports for a station created at or after `since`, newest first.
    async fn reports_for_station_since(
        &self,
        station_id: StationId,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<CrowdReport>>;

    /// The `limit` most recent reports across all stations, newest first.
    async fn recent_reports(&self, limit: i64) -> RepositoryResult<Vec<CrowdReport>>;

    /// Every stored report, oldest first. Used as training input.
    async fn all_reports(&self) -> RepositoryResult<Vec<CrowdReport>>;

    /// Number of reports, optionally restricted to those created at or after `since`.
    async fn count_reports(&self, since: Option<DateTime<Utc>>) -> RepositoryResult<i64>;

    /// Average crowd level and report count per station, optionally restricted
    /// to reports created at or after `since`. Stations without matching
    /// reports are omitted.
    async fn station_averages(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Vec<StationAverage>>;
}
