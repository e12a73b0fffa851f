//! Admin handlers: design management, the analytics views and their exports,
//! and the bulk response reset.
//!
//! Every handler except `login` takes an [`AdminAccess`], which rejects the
//! request with 401 unless `x-admin-password` matches the configured password.

use crate::{
    analytics::{
        DesignRow, ReportKind, RespondentRow, RowFilter, SortDirection, SortKey, SortSpec,
        render_design_report, render_respondent_report,
    },
    errors::AppError,
    models::{design::Design, response::Response as SurveyResponse},
    services::survey_service::{
        DesignDeletion, ImageUpload, ResetReport, SurveyError, SurveyService,
    },
};
use axum::{
    Json,
    extract::{FromRequestParts, Multipart, Path, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Proof that the request carried the admin password.
pub struct AdminAccess;

impl FromRequestParts<SurveyService> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        service: &SurveyService,
    ) -> Result<Self, Self::Rejection> {
        let password = parts
            .headers
            .get(ADMIN_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(SurveyError::InvalidPassword)?;
        service.check_admin(password)?;
        Ok(AdminAccess)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// `POST /api/admin/login`
pub async fn login(
    State(service): State<SurveyService>,
    Json(req): Json<LoginRequest>,
) -> Result<StatusCode, AppError> {
    service.check_admin(&req.password)?;
    tracing::info!("admin login accepted");
    Ok(StatusCode::NO_CONTENT)
}

/// Fields of the design upload/edit form.
#[derive(Debug, Default)]
struct DesignForm {
    name: Option<String>,
    file: Option<ImageUpload>,
}

/// Read the `name` and `file` parts. A file part without bytes counts as absent.
async fn read_design_form(mut multipart: Multipart) -> Result<DesignForm, AppError> {
    let mut form = DesignForm::default();
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => form.name = Some(field.text().await?),
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.file = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => tracing::debug!("ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

/// `POST /api/admin/designs`
pub async fn upload_design(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_design_form(multipart).await?;
    let design = service.upload_design(form.name, form.file).await?;
    Ok((StatusCode::CREATED, Json(design)))
}

/// `PATCH /api/admin/designs/{id}`
pub async fn update_design(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Design>, AppError> {
    let form = read_design_form(multipart).await?;
    Ok(Json(service.update_design(id, form.name, form.file).await?))
}

/// `DELETE /api/admin/designs/{id}`
pub async fn delete_design(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    Path(id): Path<Uuid>,
) -> Result<Json<DesignDeletion>, AppError> {
    Ok(Json(service.delete_design(id).await?))
}

/// `GET /api/admin/responses`
pub async fn list_responses(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
) -> Result<Json<Vec<SurveyResponse>>, AppError> {
    Ok(Json(service.list_responses().await?))
}

/// Filter and sort selection shared by the analytics views and exports.
///
/// `sort`/`dir` carry the current selection; `toggle` is a column-header
/// click applied on top of it.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub name: Option<String>,
    /// Kept as text so an empty input box means "no threshold".
    pub min_rating: Option<String>,
    pub sort: Option<SortKey>,
    pub dir: Option<SortDirection>,
    pub toggle: Option<SortKey>,
}

impl AnalyticsQuery {
    fn resolve(&self, default: SortSpec) -> Result<(RowFilter, SortSpec), AppError> {
        let min_rating = match self.min_rating.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Some(value),
                _ => {
                    return Err(AppError::bad_request(format!(
                        "invalid min_rating `{}`",
                        raw
                    )));
                }
            },
        };
        let filter = RowFilter {
            name: self
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            min_rating,
        };

        let mut sort = match self.sort {
            Some(key) => SortSpec {
                key,
                direction: self.dir.unwrap_or_default(),
            },
            None => SortSpec {
                direction: self.dir.unwrap_or(default.direction),
                ..default
            },
        };
        if let Some(key) = self.toggle {
            sort = sort.toggle(key);
        }
        Ok((filter, sort))
    }
}

fn analytics_query(
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<AnalyticsQuery, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// JSON body of an analytics view.
#[derive(Debug, Serialize)]
pub struct AnalyticsView<R> {
    pub rows: Vec<R>,
    pub total: usize,
    /// Effective sort, for the client to echo back.
    pub sort: SortSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_responses: Option<usize>,
}

/// `GET /api/admin/analytics/designs`
pub async fn design_analytics(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Json<AnalyticsView<DesignRow>>, AppError> {
    let (filter, sort) = analytics_query(query)?.resolve(SortSpec::designs_default())?;
    let rows = service.design_analytics(&filter, &sort).await?;
    Ok(Json(AnalyticsView {
        total: rows.len(),
        rows,
        sort,
        total_responses: None,
    }))
}

/// `GET /api/admin/analytics/respondents`
pub async fn respondent_analytics(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Json<AnalyticsView<RespondentRow>>, AppError> {
    let (filter, sort) = analytics_query(query)?.resolve(SortSpec::respondents_default())?;
    let (rows, total_responses) = service.respondent_analytics(&filter, &sort).await?;
    Ok(Json(AnalyticsView {
        total: rows.len(),
        rows,
        sort,
        total_responses: Some(total_responses),
    }))
}

/// `GET /api/admin/analytics/designs/export`
pub async fn export_design_report(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let (filter, sort) = analytics_query(query)?.resolve(SortSpec::designs_default())?;
    let rows = service.design_analytics(&filter, &sort).await?;
    let now = Utc::now();
    tracing::info!("exporting design report with {} rows", rows.len());
    html_attachment(ReportKind::Design, render_design_report(&rows, now), now)
}

/// `GET /api/admin/analytics/respondents/export`
pub async fn export_respondent_report(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let (filter, sort) = analytics_query(query)?.resolve(SortSpec::respondents_default())?;
    let (rows, _) = service.respondent_analytics(&filter, &sort).await?;
    let now = Utc::now();
    tracing::info!("exporting user report with {} rows", rows.len());
    html_attachment(ReportKind::User, render_respondent_report(&rows, now), now)
}

fn html_attachment(
    kind: ReportKind,
    html: String,
    generated_at: DateTime<Utc>,
) -> Result<Response, AppError> {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        kind.file_name(generated_at.date_naive())
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| AppError::internal(format!("invalid export file name: {}", e)))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: bool,
}

/// `POST /api/admin/responses/reset`
pub async fn reset_responses(
    _admin: AdminAccess,
    State(service): State<SurveyService>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetReport>, AppError> {
    Ok(Json(
        service.reset_responses(&req.password, req.confirm).await?,
    ))
}
