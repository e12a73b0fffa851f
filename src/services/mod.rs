//! Persistence and orchestration services.
//!
//! - `record_store`: SQLite-backed designs and responses
//! - `blob_store`: sharded on-disk design images
//! - `in_flight`: busy flags for admin mutations
//! - `survey_service`: the operations handlers call, tying the above together

use std::io;
use thiserror::Error;
use uuid::Uuid;

pub mod blob_store;
pub mod in_flight;
pub mod record_store;
pub mod survey_service;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("design `{0}` not found")]
    DesignNotFound(Uuid),
    #[error("blob `{0}` not found")]
    BlobNotFound(String),
    #[error("invalid blob key")]
    InvalidBlobKey,
    #[error("record `{id}` is corrupt: {reason}")]
    Corrupt { id: Uuid, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
