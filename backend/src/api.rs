//! Public API surface for the backend.
//!
//! This file consolidates the record and DTO types used by the HTTP API,
//! the service layer and the repositories.
//! All types exposed to clients derive Serialize/Deserialize for JSON serialization.

pub use crate::routes::analytics::CrowdedStation;
pub use crate::routes::analytics::StationAnalytics;
pub use crate::routes::analytics::StationAverage;
pub use crate::routes::analytics::SystemOverview;
pub use crate::routes::auth::LoginRequest;
pub use crate::routes::auth::NewUser;
pub use crate::routes::auth::RegisterRequest;
pub use crate::routes::auth::TokenResponse;
pub use crate::routes::auth::User;
pub use crate::routes::auth::UserProfile;
pub use crate::routes::predictions::HourlyForecast;
pub use crate::routes::predictions::HourlyPrediction;
pub use crate::routes::predictions::NewPrediction;
pub use crate::routes::predictions::Prediction;
pub use crate::routes::predictions::PredictionFactors;
pub use crate::routes::predictions::PredictionMethod;
pub use crate::routes::predictions::PredictionOutcome;
pub use crate::routes::predictions::PredictionRequest;
pub use crate::routes::predictions::PredictionResponse;
pub use crate::routes::predictions::TrainingSummary;
pub use crate::routes::reports::CreateReportRequest;
pub use crate::routes::reports::CrowdReport;
pub use crate::routes::reports::NewCrowdReport;
pub use crate::routes::stations::NewStation;
pub use crate::routes::stations::Station;
pub use crate::routes::stations::StationSummary;

pub use crate::models::{
    CrowdLevel, PredictionId, ReportId, StationId, StationType, UserId, MAX_CROWD_LEVEL,
    MIN_CROWD_LEVEL,
};
