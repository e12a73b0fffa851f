//! Represents an uploaded design image that respondents rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A design offered for rating.
///
/// The image bytes live in the blob store; the record only keeps the blob key
/// and the locator clients use to fetch it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Design {
    /// Store-assigned identifier.
    pub id: Uuid,

    /// Display name shown to respondents and admins.
    pub name: String,

    /// Locator the image resolves to (e.g. `/blobs/designs/1700000000_logo.png`).
    pub image_ref: String,

    /// Blob store key backing `image_ref`.
    pub storage_key: String,

    /// When the design was first uploaded.
    pub uploaded_at: DateTime<Utc>,
}

/// Fields accepted when creating a design record.
#[derive(Debug, Clone)]
pub struct NewDesign {
    pub name: String,
    pub image_ref: String,
    pub storage_key: String,
}

/// Partial update applied by an admin edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DesignUpdate {
    pub name: Option<String>,
    pub image: Option<DesignImage>,
}

/// A replacement image: both locator and key change together.
#[derive(Debug, Clone)]
pub struct DesignImage {
    pub image_ref: String,
    pub storage_key: String,
}
