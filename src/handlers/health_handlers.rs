//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and image-directory I/O

use crate::services::survey_service::SurveyService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness check. Always 200 and never touches a store.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness check that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Counts designs, which needs the migrated schema.
/// 3. Performs a write/read/delete round trip under the blob store directory.
///
/// HTTP 200 when every check passes, HTTP 503 otherwise.
pub async fn readyz(State(service): State<SurveyService>) -> impl IntoResponse {
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*service.records.db)
        .await
    {
        Ok(1) => CheckStatus::ok(),
        Ok(v) => CheckStatus::failed(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    };

    let tmp_path = service
        .blobs
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));
    let disk_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(_) => {
            let check = match fs::read(&tmp_path).await {
                Ok(bytes) if bytes == b"readyz" => CheckStatus::ok(),
                Ok(_) => CheckStatus::failed("file content mismatch".into()),
                Err(e) => CheckStatus::failed(format!("could not read tmp file: {}", e)),
            };
            if let Err(e) = fs::remove_file(&tmp_path).await {
                tracing::warn!("readyz could not remove {}: {}", tmp_path.display(), e);
            }
            check
        }
        Err(e) => CheckStatus::failed(format!("could not write tmp file: {}", e)),
    };

    // Fails when the schema has not been migrated yet.
    let (schema_check, designs) = match service.records.count_designs().await {
        Ok(count) => (CheckStatus::ok(), Some(count)),
        Err(e) => (CheckStatus::failed(format!("error: {}", e)), None),
    };

    let overall_ok = sqlite_check.ok && schema_check.ok && disk_check.ok;
    let checks = HashMap::from([
        ("sqlite", sqlite_check),
        ("schema", schema_check),
        ("disk", disk_check),
    ]);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
        designs,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
    designs: Option<i64>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
