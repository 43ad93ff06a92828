//! Crowd-level prediction.
//!
//! A prediction for a station at a target time comes from one of three
//! methods, tried in order:
//!
//! 1. **model**: the trained [`CrowdModel`], when one is loaded
//! 2. **heuristic**: the time bucket's base level blended with the station's
//!    recent history and trend
//! 3. **fallback**: the bare time-bucket base level, used whenever 1 or 2
//!    fails internally
//!
//! Both primary methods apply the weather adjustment and clamp the result to
//! the reportable range. [`PredictionService::predict`] never fails.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use super::error::{bounded, ServiceError, ServiceResult};
use super::features::{HistoricalStats, TimeFeatures};
use super::model::{CrowdModel, ModelError};
use super::stations::find_station;
use super::weather::{WeatherSnapshot, WeatherSource};
use crate::api::{
    CrowdReport, HourlyForecast, HourlyPrediction, NewPrediction, Prediction, PredictionFactors,
    PredictionMethod, PredictionOutcome, PredictionResponse, StationId, TrainingSummary,
};
use crate::config::{AppConfig, DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS};
use crate::db::repository::FullRepository;
use crate::models::{clamp_confidence, clamp_crowd_level, round2};

pub const MAX_HOURS_AHEAD: i64 = 168;
pub const DEFAULT_HOURLY_HOURS: i64 = 24;
pub const DEFAULT_PREDICTION_LIMIT: i64 = 10;
pub const MAX_PREDICTION_LIMIT: i64 = 100;

const WET_WEATHER_BOOST: f64 = 0.5;
const HEAT_BOOST: f64 = 0.3;
const HEAT_THRESHOLD_C: f64 = 35.0;
const WEATHER_CONFIDENCE_BONUS: f64 = 0.05;
const MAX_TREND_ADJUSTMENT: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Internal failure of a primary prediction method.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

/// Owns the optional trained model and produces predictions.
pub struct PredictionService {
    model: RwLock<Option<CrowdModel>>,
    model_path: Option<PathBuf>,
    history_days: i64,
}

impl Default for PredictionService {
    fn default() -> Self {
        Self::new(None, DEFAULT_HISTORY_DAYS)
    }
}

impl PredictionService {
    /// `history_days` is clamped to `1..=MAX_HISTORY_DAYS`.
    pub fn new(model_path: Option<PathBuf>, history_days: i64) -> Self {
        Self {
            model: RwLock::new(None),
            model_path,
            history_days: history_days.clamp(1, MAX_HISTORY_DAYS),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.model_path.clone(), config.history_days)
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn history_days(&self) -> i64 {
        self.history_days
    }

    pub fn has_model(&self) -> bool {
        self.model.read().is_some()
    }

    /// Replace the loaded model.
    pub fn set_model(&self, model: Option<CrowdModel>) {
        *self.model.write() = model;
    }

    /// Load the persisted model, if a path is configured and the file exists.
    ///
    /// A missing or unreadable file leaves the service without a model.
    pub fn load_model_from_disk(&self) -> bool {
        let Some(path) = self.model_path.as_deref() else {
            return false;
        };
        if !path.exists() {
            log::info!("No crowd model at {}; using heuristic predictions", path.display());
            return false;
        }
        match CrowdModel::load(path) {
            Ok(model) => {
                log::info!(
                    "Loaded crowd model from {} ({} samples, r²={:.3})",
                    path.display(),
                    model.samples(),
                    model.r_squared()
                );
                self.set_model(Some(model));
                true
            }
            Err(e) => {
                log::warn!("Ignoring crowd model at {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Predict the crowd level for `target_time` from a station's history.
    pub fn predict(
        &self,
        station_id: StationId,
        target_time: DateTime<Utc>,
        history: &[CrowdReport],
        weather: Option<&WeatherSnapshot>,
    ) -> PredictionOutcome {
        let features = TimeFeatures::from_time(target_time);
        let stats = HistoricalStats::from_reports(history, features.hour);

        match self.try_predict(&features, &stats, weather) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!(
                    "Prediction for station {} at {} fell back to time-bucket rule: {}",
                    station_id,
                    target_time,
                    e
                );
                fallback(&features, &stats, weather)
            }
        }
    }

    fn try_predict(
        &self,
        features: &TimeFeatures,
        stats: &HistoricalStats,
        weather: Option<&WeatherSnapshot>,
    ) -> Result<PredictionOutcome, PredictionError> {
        let (mut level, mut confidence, method) = match self.model.read().as_ref() {
            Some(model) => (
                model.predict(&features.regression_vector())?,
                0.6 + 0.3 * model.r_squared().max(0.0),
                PredictionMethod::Model,
            ),
            None => {
                let (level, confidence) = heuristic(features, stats);
                (level, confidence, PredictionMethod::Heuristic)
            }
        };

        if let Some(w) = weather {
            level += weather_adjustment(w);
            confidence += WEATHER_CONFIDENCE_BONUS;
        }

        if !level.is_finite() {
            return Err(PredictionError::NonFinite("crowd level"));
        }
        if !confidence.is_finite() {
            return Err(PredictionError::NonFinite("confidence"));
        }

        Ok(PredictionOutcome {
            predicted_crowd_level: round2(clamp_crowd_level(level)),
            confidence_score: round2(clamp_confidence(confidence)),
            method,
            factors: factors(features, stats, weather),
        })
    }

    /// Predict, persist and return a prediction `hours_ahead` hours from `now`.
    pub async fn create_prediction<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        weather: &dyn WeatherSource,
        station_id: StationId,
        hours_ahead: Option<i64>,
        now: DateTime<Utc>,
    ) -> ServiceResult<PredictionResponse> {
        let hours_ahead = bounded("hours_ahead", hours_ahead, 1, 0, MAX_HOURS_AHEAD)?;
        let station = find_station(repo, station_id).await?;
        let target_time = now + Duration::hours(hours_ahead);

        let history = self.history(repo, station_id, now).await?;
        let snapshot = weather.current(station.latitude, station.longitude).await;
        let outcome = self.predict(station_id, target_time, &history, snapshot.as_ref());

        let prediction = repo
            .insert_prediction(&NewPrediction {
                station_id,
                predicted_crowd_level: outcome.predicted_crowd_level,
                confidence_score: outcome.confidence_score,
                prediction_time: target_time,
                created_at: now,
            })
            .await?;

        Ok(PredictionResponse {
            prediction,
            method: outcome.method,
            factors: outcome.factors,
        })
    }

    /// One prediction per hour for the next `hours` hours, starting at `now`.
    /// Nothing is persisted.
    pub async fn hourly_predictions<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        station_id: StationId,
        hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> ServiceResult<HourlyForecast> {
        let hours = bounded("hours", hours, DEFAULT_HOURLY_HOURS, 1, MAX_HOURS_AHEAD)?;
        find_station(repo, station_id).await?;
        let history = self.history(repo, station_id, now).await?;

        let predictions = (0..hours)
            .map(|i| {
                let time = now + Duration::hours(i);
                HourlyPrediction {
                    time,
                    outcome: self.predict(station_id, time, &history, None),
                }
            })
            .collect();

        Ok(HourlyForecast {
            station_id,
            predictions,
        })
    }

    /// Stored predictions for a station, newest first.
    pub async fn station_predictions<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        station_id: StationId,
        limit: Option<i64>,
    ) -> ServiceResult<Vec<Prediction>> {
        let limit = bounded(
            "limit",
            limit,
            DEFAULT_PREDICTION_LIMIT,
            1,
            MAX_PREDICTION_LIMIT,
        )?;
        Ok(repo.predictions_for_station(station_id, limit).await?)
    }

    /// Train a model on every stored report and make it the active one.
    pub async fn train<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        now: DateTime<Utc>,
    ) -> ServiceResult<TrainingSummary> {
        let reports = repo.all_reports().await?;
        let model = CrowdModel::train(&reports, now).map_err(|e| match e {
            ModelError::InsufficientData { .. } => {
                ServiceError::validation("Not enough crowd reports to train")
            }
            other => ServiceError::internal(format!("Training failed: {}", other)),
        })?;

        let persisted = match self.model_path.as_deref() {
            Some(path) => match model.save(path) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to persist crowd model to {}: {}", path.display(), e);
                    false
                }
            },
            None => false,
        };

        let summary = TrainingSummary {
            samples: model.samples(),
            r_squared: model.r_squared(),
            trained_at: model.trained_at(),
            persisted,
        };
        log::info!(
            "Trained crowd model on {} reports (r²={:.3}, persisted={})",
            summary.samples,
            summary.r_squared,
            persisted
        );
        self.set_model(Some(model));
        Ok(summary)
    }

    async fn history<R: FullRepository + ?Sized>(
        &self,
        repo: &R,
        station_id: StationId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<CrowdReport>> {
        let since = Duration::try_days(self.history_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                ServiceError::internal(format!(
                    "History window of {} days before {} is out of range",
                    self.history_days, now
                ))
            })?;
        Ok(repo.reports_for_station_since(station_id, since).await?)
    }
}

/// Blend the bucket base with history. Returns `(level, confidence)`.
fn heuristic(features: &TimeFeatures, stats: &HistoricalStats) -> (f64, f64) {
    let base = features.bucket.base_level();
    let mut level = match (stats.hour_mean, stats.overall_mean) {
        (Some(hour_mean), _) => 0.6 * hour_mean + 0.4 * base,
        (None, Some(overall)) => 0.3 * overall + 0.7 * base,
        (None, None) => base,
    };
    if let Some(trend) = stats.trend {
        level += (0.5 * trend).clamp(-MAX_TREND_ADJUSTMENT, MAX_TREND_ADJUSTMENT);
    }

    let confidence = if stats.is_empty() {
        0.65
    } else {
        let mut c = 0.75;
        if stats.samples >= 10 {
            c += 0.05;
        }
        if stats.hour_mean.is_some() {
            c += 0.05;
        }
        c
    };
    (level, confidence)
}

fn weather_adjustment(weather: &WeatherSnapshot) -> f64 {
    if weather.is_wet() {
        WET_WEATHER_BOOST
    } else if weather.temperature > HEAT_THRESHOLD_C {
        HEAT_BOOST
    } else {
        0.0
    }
}

fn factors(
    features: &TimeFeatures,
    stats: &HistoricalStats,
    weather: Option<&WeatherSnapshot>,
) -> PredictionFactors {
    PredictionFactors {
        time_of_day: features.time_of_day().to_string(),
        day_type: features.day_type().to_string(),
        weather_impact: weather
            .map(|w| w.condition.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        historical_samples: stats.samples,
    }
}

fn fallback(
    features: &TimeFeatures,
    stats: &HistoricalStats,
    weather: Option<&WeatherSnapshot>,
) -> PredictionOutcome {
    PredictionOutcome {
        predicted_crowd_level: round2(features.bucket.base_level()),
        confidence_score: FALLBACK_CONFIDENCE,
        method: PredictionMethod::Fallback,
        factors: factors(features, stats, weather),
    }
}
