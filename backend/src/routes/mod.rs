//! Route-level record types.
//!
//! Each submodule owns the types exchanged on one area of the API together
//! with the path constants the HTTP router mounts them on.

pub mod analytics;
pub mod auth;
pub mod predictions;
pub mod reports;
pub mod stations;
