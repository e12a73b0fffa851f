//! src/services/survey_service.rs
//!
//! SurveyService: the operations behind every HTTP handler. It owns the
//! record store, the blob store and the busy flags, and keeps the design ↔ blob
//! invariant: after any upload, edit or delete completes, a design references
//! exactly one live blob.
//!
//! Reads are bounded by the store timeout and simply abandoned on expiry.
//! Mutations are not: each one runs to completion on its own task, together
//! with its compensation and its busy slot, and the timeout only bounds how
//! long the caller waits for the outcome.

use super::{
    StoreError, StoreResult,
    blob_store::BlobStore,
    in_flight::{InFlight, InFlightGuard, Operation},
    record_store::RecordStore,
};
use crate::{
    analytics::{self, DesignRow, RespondentRow, RowFilter, SortSpec},
    models::{
        design::{Design, DesignImage, DesignUpdate, NewDesign},
        response::{FieldErrors, Rating, RespondentAttributes, Response, ResponseSubmission},
    },
};
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Invalid admin password")]
    InvalidResetPassword,
    #[error("deleting all responses must be explicitly confirmed")]
    ConfirmationRequired,
    #[error("a {0} is already in progress")]
    Busy(Operation),
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
    #[error("{operation} did not finish within {seconds}s and is still completing")]
    StillRunning {
        operation: &'static str,
        seconds: u64,
    },
    #[error("{0} failed: {1}")]
    Task(&'static str, JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SurveyResult<T> = Result<T, SurveyError>;

impl SurveyError {
    fn field(field: &str, message: &str) -> Self {
        SurveyError::Validation(FieldErrors::from([(field.to_string(), message.to_string())]))
    }
}

/// Credentials and limits the service enforces.
///
/// The passwords are shared plaintext values compared on every admin call.
/// They keep casual visitors out of the dashboard and nothing more; real
/// access control needs per-user authentication in front of this service.
#[derive(Clone)]
pub struct ServiceSettings {
    pub admin_password: String,
    pub reset_password: String,
    pub store_timeout: Duration,
}

/// An uploaded image file taken from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    fn ensure_image(&self) -> SurveyResult<()> {
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => Ok(()),
            _ => Err(SurveyError::field("file", "Please select an image file")),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DesignDeletion {
    pub id: Uuid,
    /// False when the record is gone but its image could not be removed.
    pub blob_released: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResetReport {
    pub requested: usize,
    pub deleted: u64,
}

#[derive(Clone)]
pub struct SurveyService {
    pub records: RecordStore,
    pub blobs: BlobStore,
    in_flight: InFlight,
    settings: Arc<ServiceSettings>,
}

impl SurveyService {
    pub fn new(records: RecordStore, blobs: BlobStore, settings: ServiceSettings) -> Self {
        Self {
            records,
            blobs,
            in_flight: InFlight::default(),
            settings: Arc::new(settings),
        }
    }

    /// Run a read under the configured timeout.
    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> SurveyResult<T> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!("{} timed out", operation);
                Err(SurveyError::Timeout {
                    operation,
                    seconds: self.settings.store_timeout.as_secs(),
                })
            }
        }
    }

    /// Run a mutation on its own task and wait at most the configured timeout.
    ///
    /// On expiry the task keeps going: the write, its compensation and the
    /// release of any busy slot it owns all still happen.
    async fn detached<T, F>(&self, operation: &'static str, work: F) -> SurveyResult<T>
    where
        T: Send + 'static,
        F: Future<Output = SurveyResult<T>> + Send + 'static,
    {
        let task = tokio::spawn(work);
        match tokio::time::timeout(self.settings.store_timeout, task).await {
            Ok(joined) => joined.map_err(|err| SurveyError::Task(operation, err))?,
            Err(_) => {
                warn!(
                    "{} still running after {:?}; finishing in the background",
                    operation, self.settings.store_timeout
                );
                Err(SurveyError::StillRunning {
                    operation,
                    seconds: self.settings.store_timeout.as_secs(),
                })
            }
        }
    }

    fn claim(&self, op: Operation) -> SurveyResult<InFlightGuard> {
        self.in_flight.try_claim(op).ok_or(SurveyError::Busy(op))
    }

    pub fn check_admin(&self, password: &str) -> SurveyResult<()> {
        if password == self.settings.admin_password {
            Ok(())
        } else {
            Err(SurveyError::InvalidPassword)
        }
    }

    pub async fn list_designs(&self) -> SurveyResult<Vec<Design>> {
        self.timed("list designs", self.records.list_designs()).await
    }

    pub async fn list_responses(&self) -> SurveyResult<Vec<Response>> {
        self.timed("list responses", self.records.list_responses())
            .await
    }

    pub async fn open_blob(&self, key: &str) -> SurveyResult<tokio::fs::File> {
        self.timed("open image", self.blobs.open(key)).await
    }

    /// Persist one complete response. Nothing is written unless every design
    /// currently offered carries both ratings.
    pub async fn submit_response(&self, submission: ResponseSubmission) -> SurveyResult<Response> {
        let designs = self.list_designs().await?;
        let design_ids: Vec<Uuid> = designs.iter().map(|d| d.id).collect();
        let (user_data, ratings) = submission
            .validate(&design_ids)
            .map_err(SurveyError::Validation)?;

        let records = self.records.clone();
        let response = self
            .detached("submit response", insert_response(records, user_data, ratings))
            .await?;
        info!(
            "response {} submitted with {} ratings",
            response.id,
            response.ratings.len()
        );
        Ok(response)
    }

    async fn snapshot(&self) -> SurveyResult<(Vec<Response>, Vec<Design>)> {
        tokio::try_join!(self.list_responses(), self.list_designs())
    }

    pub async fn design_analytics(
        &self,
        filter: &RowFilter,
        sort: &SortSpec,
    ) -> SurveyResult<Vec<DesignRow>> {
        let (responses, designs) = self.snapshot().await?;
        Ok(analytics::project_designs(&responses, &designs, filter, sort))
    }

    /// Respondent rows plus the number of raw responses they were built from.
    pub async fn respondent_analytics(
        &self,
        filter: &RowFilter,
        sort: &SortSpec,
    ) -> SurveyResult<(Vec<RespondentRow>, usize)> {
        let responses = self.list_responses().await?;
        let rows = analytics::project_respondents(&responses, filter, sort);
        Ok((rows, responses.len()))
    }

    /// Store the image, then create the record pointing at it. If the record
    /// cannot be created the image is released again.
    pub async fn upload_design(
        &self,
        name: Option<String>,
        upload: Option<ImageUpload>,
    ) -> SurveyResult<Design> {
        let name = name.as_deref().map(str::trim).unwrap_or_default();
        let upload = match upload {
            Some(upload) if !name.is_empty() => upload,
            _ => {
                return Err(SurveyError::field(
                    "form",
                    "Please provide both a design name and an image file",
                ));
            }
        };
        upload.ensure_image()?;

        let guard = self.claim(Operation::Upload)?;
        let this = self.clone();
        let name = name.to_string();
        self.detached("upload design", async move {
            let _guard = guard;
            this.create_design(name, upload).await
        })
        .await
    }

    async fn create_design(&self, name: String, upload: ImageUpload) -> SurveyResult<Design> {
        let key = BlobStore::design_key(&upload.file_name);
        let stored = self.blobs.store_bytes(&key, upload.bytes).await?;

        let created = self
            .records
            .create_design(NewDesign {
                name,
                image_ref: stored.locator.clone(),
                storage_key: stored.key.clone(),
            })
            .await;

        match created {
            Ok(design) => {
                info!(
                    "design {} uploaded as {} ({} bytes, md5 {})",
                    design.id, design.storage_key, stored.size_bytes, stored.etag
                );
                Ok(design)
            }
            Err(err) => {
                self.release_blob(&stored.key).await;
                Err(err.into())
            }
        }
    }

    /// Rename a design and optionally replace its image.
    ///
    /// A replacement image is stored first and the record switched to it; the
    /// old image is released only after the switch succeeds, and the new one is
    /// released if it fails.
    pub async fn update_design(
        &self,
        id: Uuid,
        name: Option<String>,
        upload: Option<ImageUpload>,
    ) -> SurveyResult<Design> {
        let name = name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SurveyError::field("name", "Please provide a design name"))?
            .to_string();
        if let Some(upload) = &upload {
            upload.ensure_image()?;
        }

        let guard = self.claim(Operation::Design(id))?;
        let this = self.clone();
        self.detached("update design", async move {
            let _guard = guard;
            this.replace_design(id, name, upload).await
        })
        .await
    }

    async fn replace_design(
        &self,
        id: Uuid,
        name: String,
        upload: Option<ImageUpload>,
    ) -> SurveyResult<Design> {
        let current = self.records.get_design(id).await?;

        let stored = match upload {
            Some(upload) => {
                let key = BlobStore::design_key(&upload.file_name);
                Some(self.blobs.store_bytes(&key, upload.bytes).await?)
            }
            None => None,
        };

        let update = DesignUpdate {
            name: Some(name),
            image: stored.as_ref().map(|blob| DesignImage {
                image_ref: blob.locator.clone(),
                storage_key: blob.key.clone(),
            }),
        };
        let updated = match self.records.update_design(id, &update).await {
            Ok(design) => design,
            Err(err) => {
                if let Some(blob) = &stored {
                    self.release_blob(&blob.key).await;
                }
                return Err(err.into());
            }
        };

        if stored.is_some()
            && !current.storage_key.is_empty()
            && current.storage_key != updated.storage_key
        {
            self.release_blob(&current.storage_key).await;
        }
        info!("design {} updated", id);
        Ok(updated)
    }

    /// Delete the record first; the image goes only once nothing references it.
    pub async fn delete_design(&self, id: Uuid) -> SurveyResult<DesignDeletion> {
        let guard = self.claim(Operation::Design(id))?;
        let this = self.clone();
        self.detached("delete design", async move {
            let _guard = guard;
            this.remove_design(id).await
        })
        .await
    }

    async fn remove_design(&self, id: Uuid) -> SurveyResult<DesignDeletion> {
        let design = self.records.delete_design(id).await?;

        let blob_released = design.storage_key.is_empty()
            || self.release_blob(&design.storage_key).await;
        info!("design {} ({}) deleted", id, design.name);
        Ok(DesignDeletion { id, blob_released })
    }

    /// Delete every response in one transaction.
    ///
    /// The password is checked before anything else; a wrong password or a
    /// missing confirmation leaves the store untouched.
    pub async fn reset_responses(&self, password: &str, confirm: bool) -> SurveyResult<ResetReport> {
        if password != self.settings.reset_password {
            return Err(SurveyError::InvalidResetPassword);
        }
        if !confirm {
            return Err(SurveyError::ConfirmationRequired);
        }

        let guard = self.claim(Operation::Reset)?;
        let records = self.records.clone();
        self.detached("reset responses", async move {
            let _guard = guard;
            let ids: Vec<Uuid> = records
                .list_responses()
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect();
            let deleted = records.delete_responses(&ids).await?;

            info!("reset removed {} of {} responses", deleted, ids.len());
            Ok(ResetReport {
                requested: ids.len(),
                deleted,
            })
        })
        .await
    }

    /// Best-effort removal of an image nothing references any more.
    async fn release_blob(&self, key: &str) -> bool {
        match self.blobs.delete(key).await {
            Ok(_) => true,
            Err(err) => {
                warn!("could not release image {}: {}", key, err);
                false
            }
        }
    }
}

async fn insert_response(
    records: RecordStore,
    user_data: RespondentAttributes,
    ratings: HashMap<Uuid, Rating>,
) -> SurveyResult<Response> {
    Ok(records
        .create_response(&user_data, &ratings, Utc::now())
        .await?)
}
