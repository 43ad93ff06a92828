use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PredictionId, StationId};

/// A persisted prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub station_id: StationId,
    pub predicted_crowd_level: f64,
    pub confidence_score: f64,
    pub prediction_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Prediction ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub station_id: StationId,
    pub predicted_crowd_level: f64,
    pub confidence_score: f64,
    pub prediction_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Which path produced an estimate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMethod {
    /// Trained regression model.
    Model,
    /// Time-bucket rule blended with history.
    Heuristic,
    /// Plain time-bucket rule substituted after an internal error.
    Fallback,
}

/// Explanatory factors attached to every estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFactors {
    pub time_of_day: String,
    pub day_type: String,
    pub weather_impact: String,
    pub historical_samples: usize,
}

/// Result of one prediction computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub predicted_crowd_level: f64,
    pub confidence_score: f64,
    pub method: PredictionMethod,
    pub factors: PredictionFactors,
}

/// Body of `POST /api/predictions/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub station_id: StationId,
    #[serde(default = "default_hours_ahead")]
    pub hours_ahead: i64,
}

fn default_hours_ahead() -> i64 {
    1
}

/// Stored prediction together with how it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub method: PredictionMethod,
    pub factors: PredictionFactors,
}

/// One entry of an hourly forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPrediction {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
}

/// Hourly forecast for a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub station_id: StationId,
    pub predictions: Vec<HourlyPrediction>,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub samples: usize,
    pub r_squared: f64,
    pub trained_at: DateTime<Utc>,
    pub persisted: bool,
}

pub const PREDICT: &str = "/api/predictions/predict";
pub const HOURLY: &str = "/api/predictions/hourly/{station_id}";
pub const STATION_PREDICTIONS: &str = "/api/predictions/station/{station_id}";
pub const TRAIN: &str = "/api/predictions/train";
