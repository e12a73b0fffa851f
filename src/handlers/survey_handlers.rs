//! Respondent-facing handlers: the attribute form, the design list, response
//! submission and image download.

use crate::{
    errors::AppError,
    models::{
        design::Design,
        response::{RespondentForm, ResponseSubmission},
    },
    services::{blob_store::content_type_for, survey_service::SurveyService},
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Acknowledgement returned once a response is stored.
#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

/// `POST /api/respondent/validate`
///
/// Checks the attribute step on its own so the client can move on to rating.
pub async fn validate_respondent(
    Json(form): Json<RespondentForm>,
) -> Result<StatusCode, AppError> {
    form.validate().map_err(AppError::validation)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/designs`
pub async fn list_designs(
    State(service): State<SurveyService>,
) -> Result<Json<Vec<Design>>, AppError> {
    Ok(Json(service.list_designs().await?))
}

/// `POST /api/responses`
pub async fn submit_response(
    State(service): State<SurveyService>,
    Json(submission): Json<ResponseSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let response = service.submit_response(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmissionReceipt {
            id: response.id,
            submitted_at: response.submitted_at,
        }),
    ))
}

/// `GET /blobs/{*key}` streams a stored design image.
pub async fn get_blob(
    State(service): State<SurveyService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let file = service.open_blob(&key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&key)),
    );
    Ok(response)
}
