//! Repository trait definitions for database operations.
//!
//! This module provides a collection of focused repository traits that abstract
//! database operations. Each trait covers one entity so implementations stay
//! small and testable.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`station`]: Station CRUD and the health check
//! - [`user`]: Account storage and lookups
//! - [`report`]: Crowd reports and their aggregates
//! - [`prediction`]: Stored predictions
//!
//! # Convenience Trait Bound
//!
//! For functions that need all repository capabilities, use the [`FullRepository`] trait bound:
//!
//! ```ignore
//! async fn my_service<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<()> {
//!     let station = repo.get_station(station_id).await?;
//!     let reports = repo.reports_for_station_since(station.id, since).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod prediction;
pub mod report;
pub mod station;
pub mod user;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use prediction::PredictionRepository;
pub use report::ReportRepository;
pub use station::StationRepository;
pub use user::UserRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements all four
/// repository traits.
pub trait FullRepository:
    StationRepository + UserRepository + ReportRepository + PredictionRepository
{
}

impl<T> FullRepository for T where
    T: StationRepository + UserRepository + ReportRepository + PredictionRepository
{
}
