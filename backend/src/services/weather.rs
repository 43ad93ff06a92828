//! Weather lookup seam.
//!
//! The predictor and report intake only need "what is the weather at this
//! station right now". Real providers plug in behind [`WeatherSource`]; the
//! crate ships a no-op source and a fixed one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Conditions that make stations noticeably busier.
pub const WET_CONDITIONS: [&str; 4] = ["Rain", "Thunderstorm", "Drizzle", "Snow"];

/// Current weather at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius
    pub temperature: f64,
    /// Provider condition label, e.g. "Clear", "Rain"
    pub condition: String,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl WeatherSnapshot {
    pub fn new(temperature: f64, condition: impl Into<String>, humidity: f64) -> Self {
        Self {
            temperature,
            condition: condition.into(),
            humidity,
        }
    }

    pub fn is_wet(&self) -> bool {
        WET_CONDITIONS
            .iter()
            .any(|c| c.eq_ignore_ascii_case(self.condition.trim()))
    }
}

/// Source of current weather. `None` means "unknown", never an error.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> Option<WeatherSnapshot>;
}

/// Weather source that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

#[async_trait]
impl WeatherSource for NoWeather {
    async fn current(&self, _latitude: f64, _longitude: f64) -> Option<WeatherSnapshot> {
        None
    }
}

/// Weather source returning the same snapshot everywhere.
#[derive(Debug, Clone)]
pub struct FixedWeather(pub WeatherSnapshot);

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn current(&self, _latitude: f64, _longitude: f64) -> Option<WeatherSnapshot> {
        Some(self.0.clone())
    }
}
