//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use super::dto::{
    DaysQuery, HealthResponse, HoursQuery, LimitQuery, MessageResponse, PaginationQuery,
};
use super::error::AppError;
use super::extract::{Credentials, CurrentUser, ValidJson, ValidPath, ValidQuery};
use super::state::AppState;
use crate::api::{
    CreateReportRequest, CrowdReport, HourlyForecast, NewStation, Prediction, PredictionRequest,
    PredictionResponse, RegisterRequest, Station, StationAnalytics, StationId, StationSummary,
    SystemOverview, TokenResponse, TrainingSummary, UserProfile,
};
use crate::services::{analytics, reports, stations};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Result type for handlers that create a resource.
pub type CreatedResult<T> = Result<(StatusCode, Json<T>), AppError>;

fn created<T>(value: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(value)))
}

// =============================================================================
// Service status
// =============================================================================

/// GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Crowding Predictor API is running".to_string(),
    })
}

/// GET /health
///
/// Health check endpoint to verify the service is running and database is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Authentication
// =============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> CreatedResult<UserProfile> {
    let profile = state
        .auth
        .register(state.repository.as_ref(), &request)
        .await?;
    created(profile)
}

/// POST /api/auth/login
///
/// Accepts `username`/`password` as JSON or form fields.
pub async fn login(
    State(state): State<AppState>,
    Credentials(request): Credentials,
) -> HandlerResult<TokenResponse> {
    let token = state
        .auth
        .login(
            state.repository.as_ref(),
            &request.username,
            &request.password,
            Utc::now(),
        )
        .await?;
    Ok(Json(token))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> HandlerResult<UserProfile> {
    Ok(Json(user.into()))
}

// =============================================================================
// Stations
// =============================================================================

/// GET /api/stations
pub async fn list_stations(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PaginationQuery>,
) -> HandlerResult<Vec<StationSummary>> {
    let list = stations::list_stations(
        state.repository.as_ref(),
        query.skip,
        query.limit,
        Utc::now(),
    )
    .await?;
    Ok(Json(list))
}

/// GET /api/stations/{station_id}
pub async fn get_station(
    State(state): State<AppState>,
    ValidPath(station_id): ValidPath<StationId>,
) -> HandlerResult<StationSummary> {
    let station = stations::get_station(state.repository.as_ref(), station_id, Utc::now()).await?;
    Ok(Json(station))
}

/// POST /api/stations
pub async fn create_station(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(request): ValidJson<NewStation>,
) -> CreatedResult<Station> {
    let station = stations::create_station(state.repository.as_ref(), &request).await?;
    tracing::info!("Station {} created by {}", station.id, user.username);
    created(station)
}

// =============================================================================
// Crowd reports
// =============================================================================

/// POST /api/crowd-reports
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(request): ValidJson<CreateReportRequest>,
) -> CreatedResult<CrowdReport> {
    let report = reports::create_report(
        state.repository.as_ref(),
        state.weather.as_ref(),
        &user,
        &request,
        Utc::now(),
    )
    .await?;
    created(report)
}

/// GET /api/crowd-reports/station/{station_id}
pub async fn station_reports(
    State(state): State<AppState>,
    ValidPath(station_id): ValidPath<StationId>,
    ValidQuery(query): ValidQuery<HoursQuery>,
) -> HandlerResult<Vec<CrowdReport>> {
    let list =
        reports::station_reports(state.repository.as_ref(), station_id, query.hours, Utc::now())
            .await?;
    Ok(Json(list))
}

/// GET /api/crowd-reports/recent
pub async fn recent_reports(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> HandlerResult<Vec<CrowdReport>> {
    let list = reports::recent_reports(state.repository.as_ref(), query.limit).await?;
    Ok(Json(list))
}

// =============================================================================
// Predictions
// =============================================================================

/// POST /api/predictions/predict
pub async fn predict(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<PredictionRequest>,
) -> CreatedResult<PredictionResponse> {
    let response = state
        .predictor
        .create_prediction(
            state.repository.as_ref(),
            state.weather.as_ref(),
            request.station_id,
            Some(request.hours_ahead),
            Utc::now(),
        )
        .await?;
    created(response)
}

/// GET /api/predictions/hourly/{station_id}
pub async fn hourly_predictions(
    State(state): State<AppState>,
    ValidPath(station_id): ValidPath<StationId>,
    ValidQuery(query): ValidQuery<HoursQuery>,
) -> HandlerResult<HourlyForecast> {
    let forecast = state
        .predictor
        .hourly_predictions(state.repository.as_ref(), station_id, query.hours, Utc::now())
        .await?;
    Ok(Json(forecast))
}

/// GET /api/predictions/station/{station_id}
pub async fn station_predictions(
    State(state): State<AppState>,
    ValidPath(station_id): ValidPath<StationId>,
    ValidQuery(query): ValidQuery<LimitQuery>,
) -> HandlerResult<Vec<Prediction>> {
    let list = state
        .predictor
        .station_predictions(state.repository.as_ref(), station_id, query.limit)
        .await?;
    Ok(Json(list))
}

/// POST /api/predictions/train
pub async fn train_model(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> HandlerResult<TrainingSummary> {
    tracing::info!("Model training requested by {}", user.username);
    let summary = state
        .predictor
        .train(state.repository.as_ref(), Utc::now())
        .await?;
    Ok(Json(summary))
}

// =============================================================================
// Analytics
// =============================================================================

/// GET /api/analytics/station/{station_id}
pub async fn station_analytics(
    State(state): State<AppState>,
    ValidPath(station_id): ValidPath<StationId>,
    ValidQuery(query): ValidQuery<DaysQuery>,
) -> HandlerResult<StationAnalytics> {
    let result =
        analytics::station_analytics(state.repository.as_ref(), station_id, query.days, Utc::now())
            .await?;
    Ok(Json(result))
}

/// GET /api/analytics/overview
pub async fn system_overview(State(state): State<AppState>) -> HandlerResult<SystemOverview> {
    let overview = analytics::system_overview(state.repository.as_ref(), Utc::now()).await?;
    Ok(Json(overview))
}
