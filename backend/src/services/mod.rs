//! Service layer for business logic and orchestration.
//!
//! Services sit between the HTTP handlers and the repository traits. They
//! validate input, combine repository calls and implement the prediction and
//! analytics logic. Every function is generic over [`FullRepository`] so the
//! same code runs against the in-memory and the Postgres store.
//!
//! [`FullRepository`]: crate::db::repository::FullRepository

pub mod analytics;
pub mod auth;
pub mod error;
pub mod features;
pub mod model;
pub mod predictions;
pub mod reports;
pub mod stations;
pub mod weather;

pub use auth::AuthService;
pub use error::{ServiceError, ServiceResult};
pub use model::{CrowdModel, ModelError};
pub use predictions::PredictionService;
pub use weather::{FixedWeather, NoWeather, WeatherSnapshot, WeatherSource};
