//! Prediction repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{NewPrediction, Prediction, StationId};

/// Repository trait for stored predictions.
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Insert a prediction.
    async fn insert_prediction(&self, prediction: &NewPrediction) -> RepositoryResult<Prediction>;

    /// The `limit` most recently created predictions for a station, newest first.
    async fn predictions_for_station(
        &self,
        station_id: StationId,
        limit: i64,
    ) -> RepositoryResult<Vec<Prediction>>;
}
