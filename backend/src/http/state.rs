//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::repository::FullRepository;
use crate::services::{AuthService, NoWeather, PredictionService, WeatherSource};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for database operations
    pub repository: Arc<dyn FullRepository>,
    /// Token issuing and account workflows
    pub auth: Arc<AuthService>,
    /// Prediction service holding the currently loaded model
    pub predictor: Arc<PredictionService>,
    /// Current weather lookup for stations
    pub weather: Arc<dyn WeatherSource>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build state from configuration with no weather provider.
    pub fn new(repository: Arc<dyn FullRepository>, config: AppConfig) -> Self {
        Self {
            repository,
            auth: Arc::new(AuthService::new(
                &config.secret_key,
                config.access_token_expire_minutes,
            )),
            predictor: Arc::new(PredictionService::from_config(&config)),
            weather: Arc::new(NoWeather),
            config: Arc::new(config),
        }
    }

    /// Replace the weather provider.
    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = weather;
        self
    }

    /// Replace the prediction service (e.g. one with a preloaded model).
    pub fn with_predictor(mut self, predictor: Arc<PredictionService>) -> Self {
        self.predictor = predictor;
        self
    }
}
