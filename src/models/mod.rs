//! Core data models for the survey service.
//!
//! Designs map directly to database rows via `sqlx::FromRow`; responses are
//! assembled from a `responses` row plus its `ratings` rows. Everything
//! serializes as JSON via `serde`.

pub mod design;
pub mod response;
