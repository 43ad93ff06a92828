//! # Crowd Predictor Backend
//!
//! Crowd-sourced congestion reports and crowd-level predictions for transit
//! stations.
//!
//! Riders register, report how crowded a station is on a 1–5 scale, and the
//! service estimates future crowding from the time of day, the station's
//! recent history and (when available) the weather. Estimates come from a
//! rule-based heuristic until a small linear model has been trained on the
//! stored reports.
//!
//! ## Architecture
//!
//! - [`api`]: record and DTO types shared by every layer
//! - [`config`]: server, authentication and prediction settings
//! - [`db`]: repository traits with in-memory and PostgreSQL backends
//! - [`services`]: accounts, reports, predictions and analytics
//! - [`http`]: Axum-based HTTP server and request handlers
//! - [`routes`]: route-specific data types and path constants

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;

pub mod db;
pub mod models;

pub mod routes;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
