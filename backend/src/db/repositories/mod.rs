//! Repository implementations.
//!
//! - `local`: in-memory document store for tests and local development
//! - `postgres`: relational store on Diesel (feature `postgres-repo`)
pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::{PostgresConfig, PostgresRepository};
