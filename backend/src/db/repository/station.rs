//! Station repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{NewStation, Station, StationId};

/// Repository trait for stations.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Check if the underlying store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Insert a station and return it with its assigned id.
    async fn create_station(&self, station: &NewStation) -> RepositoryResult<Station>;

    /// Fetch a station by id.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the station does not exist
    async fn get_station(&self, station_id: StationId) -> RepositoryResult<Station>;

    /// List stations ordered by id, skipping `skip` and returning at most `limit`.
    async fn list_stations(&self, skip: i64, limit: i64) -> RepositoryResult<Vec<Station>>;

    /// Total number of stations.
    async fn count_stations(&self) -> RepositoryResult<i64>;
}
