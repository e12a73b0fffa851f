//! Defines routes for the survey and its admin dashboard.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Respondent endpoints**
//!   - `POST   /api/respondent/validate`: check the attribute step
//!   - `GET    /api/designs`: designs to rate, by name
//!   - `POST   /api/responses`: submit a complete response
//!   - `GET    /blobs/{*key}`: design image bytes
//!
//! - **Admin endpoints** (require `x-admin-password`)
//!   - `POST   /api/admin/login`
//!   - `POST   /api/admin/designs`, `PATCH|DELETE /api/admin/designs/{id}`
//!   - `GET    /api/admin/responses`
//!   - `GET    /api/admin/analytics/{designs|respondents}[/export]`
//!   - `POST   /api/admin/responses/reset`
//!
//! The wildcard `*key` allows nested blob keys like `designs/1700000000_logo.png`.

use crate::{
    handlers::{
        admin_handlers::{
            delete_design, design_analytics, export_design_report, export_respondent_report,
            list_responses, login, reset_responses, respondent_analytics, update_design,
            upload_design,
        },
        health_handlers::{healthz, readyz},
        survey_handlers::{get_blob, list_designs, submit_response, validate_respondent},
    },
    services::survey_service::SurveyService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Build the router for every endpoint.
///
/// Request bodies are capped at `max_upload_bytes`, which bounds image uploads.
pub fn routes(max_upload_bytes: usize) -> Router<SurveyService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // respondent flow
        .route("/api/respondent/validate", post(validate_respondent))
        .route("/api/designs", get(list_designs))
        .route("/api/responses", post(submit_response))
        .route("/blobs/{*key}", get(get_blob))
        // admin dashboard
        .route("/api/admin/login", post(login))
        .route("/api/admin/designs", post(upload_design))
        .route(
            "/api/admin/designs/{id}",
            patch(update_design).delete(delete_design),
        )
        .route("/api/admin/responses", get(list_responses))
        .route("/api/admin/responses/reset", post(reset_responses))
        .route("/api/admin/analytics/designs", get(design_analytics))
        .route(
            "/api/admin/analytics/designs/export",
            get(export_design_report),
        )
        .route("/api/admin/analytics/respondents", get(respondent_analytics))
        .route(
            "/api/admin/analytics/respondents/export",
            get(export_respondent_report),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        blob_store::BlobStore,
        record_store::tests::memory_store,
        survey_service::ServiceSettings,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const ADMIN: &str = "admin-secret";
    const BOUNDARY: &str = "survey-test-boundary";

    async fn app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = SurveyService::new(
            memory_store().await,
            BlobStore::new(dir.path()),
            ServiceSettings {
                admin_password: ADMIN.into(),
                reset_password: "reset-secret".into(),
                store_timeout: Duration::from_secs(5),
            },
        );
        (routes(1024 * 1024).with_state(service), dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-admin-password", ADMIN)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-admin-password", ADMIN)
            .body(Body::empty())
            .unwrap()
    }

    fn design_form(method: &str, uri: &str, name: &str, file: Option<(&str, &[u8])>) -> Request<Body> {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n",
                    b = BOUNDARY
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("x-admin-password", ADMIN)
            .body(Body::from(body))
            .unwrap()
    }

    async fn upload(app: &Router, name: &str) -> Value {
        let (status, design) = send_json(
            app,
            design_form("POST", "/api/admin/designs", name, Some(("logo.png", &b"png"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        design
    }

    async fn submit(app: &Router, respondent: &str, ratings: Value) -> StatusCode {
        let body = json!({
            "user_data": { "name": respondent, "age": 30, "gender": "female" },
            "ratings": ratings,
        });
        send_json(app, json_request("POST", "/api/responses", body)).await.0
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            Request::builder().uri("/healthz").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_checks_database_and_disk() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            Request::builder().uri("/readyz").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["disk"]["ok"], true);
    }

    #[tokio::test]
    async fn respondent_validation_reports_each_field() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            json_request(
                "POST",
                "/api/respondent/validate",
                json!({ "name": "", "age": 0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["name"], "Name is required");
        assert_eq!(body["errors"]["age"], "Please enter a valid age");
        assert_eq!(body["errors"]["gender"], "Please select your gender");

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/respondent/validate",
                json!({ "name": "Sam", "age": 30, "gender": "prefer-not-to-say" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn admin_routes_require_password() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            Request::builder()
                .uri("/api/admin/responses")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid password");

        let (status, _) = send(
            &app,
            json_request("POST", "/api/admin/login", json!({ "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/admin/login", json!({ "password": ADMIN })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn uploaded_design_is_listed_and_served() {
        let (app, _dir) = app().await;
        let design = upload(&app, "Logo").await;
        let image_ref = design["image_ref"].as_str().unwrap().to_string();

        let (status, designs) = send_json(
            &app,
            Request::builder().uri("/api/designs").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(designs.as_array().unwrap().len(), 1);
        assert_eq!(designs[0]["name"], "Logo");

        let response = app
            .clone()
            .oneshot(Request::builder().uri(&image_ref).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"png");
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let (app, _dir) = app().await;
        let (status, body) =
            send_json(&app, design_form("POST", "/api/admin/designs", "Logo", None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["error"],
            "Please provide both a design name and an image file"
        );
    }

    #[tokio::test]
    async fn edit_and_delete_design() {
        let (app, _dir) = app().await;
        let design = upload(&app, "Logo").await;
        let uri = format!("/api/admin/designs/{}", design["id"].as_str().unwrap());

        let (status, renamed) = send_json(&app, design_form("PATCH", &uri, "Renamed", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Renamed");
        assert_eq!(renamed["image_ref"], design["image_ref"]);

        let (status, deletion) = send_json(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header("x-admin-password", ADMIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deletion["blob_released"], true);

        let (status, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header("x-admin-password", ADMIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn incomplete_submission_is_rejected() {
        let (app, _dir) = app().await;
        let design = upload(&app, "Logo").await;
        let id = design["id"].as_str().unwrap().to_string();

        let status = submit(&app, "Sam", json!({ id.clone(): { "design_quality": 4 } })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let status = submit(
            &app,
            "Sam",
            json!({ id: { "design_quality": 4, "buy_intention": 2 } }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn analytics_views_filter_sort_and_export() {
        let (app, _dir) = app().await;
        let alpha = upload(&app, "Alpha").await;
        let beta = upload(&app, "Beta").await;
        let (a, b) = (
            alpha["id"].as_str().unwrap().to_string(),
            beta["id"].as_str().unwrap().to_string(),
        );
        for (respondent, quality) in [("Sam", 5), ("Kim", 3)] {
            let status = submit(
                &app,
                respondent,
                json!({
                    a.clone(): { "design_quality": quality, "buy_intention": 2 },
                    b.clone(): { "design_quality": 1, "buy_intention": 1 },
                }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, view) = send_json(&app, admin_get("/api/admin/analytics/designs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["total"], 2);
        assert_eq!(view["rows"][0]["name"], "Alpha");
        assert_eq!(view["rows"][0]["stats"]["avg_quality"], 4.0);
        assert_eq!(view["rows"][0]["stats"]["quality_distribution"]["5"], 1);
        assert_eq!(view["sort"], json!({ "key": "avg_quality", "direction": "desc" }));

        let (_, toggled) = send_json(
            &app,
            admin_get("/api/admin/analytics/designs?sort=avg_quality&dir=desc&toggle=avg_quality"),
        )
        .await;
        assert_eq!(toggled["sort"]["direction"], "asc");
        assert_eq!(toggled["rows"][0]["name"], "Beta");

        let (_, filtered) =
            send_json(&app, admin_get("/api/admin/analytics/designs?min_rating=3&name=")).await;
        assert_eq!(filtered["total"], 1);

        let (status, respondents) =
            send_json(&app, admin_get("/api/admin/analytics/respondents?name=sa")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(respondents["total"], 1);
        assert_eq!(respondents["total_responses"], 2);
        assert_eq!(respondents["rows"][0]["display_name"], "Sam");

        let (status, _) =
            send(&app, admin_get("/api/admin/analytics/designs?min_rating=high")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(admin_get("/api/admin/analytics/designs/export?name=alp"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"design-analytics-"));
        let html = String::from_utf8(
            to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
        )
        .unwrap();
        assert!(html.contains("Total Designs: 1"));
        assert!(html.contains("Alpha"));
        assert!(!html.contains("Beta"));
    }

    #[tokio::test]
    async fn reset_requires_password_and_confirmation() {
        let (app, _dir) = app().await;
        let design = upload(&app, "Logo").await;
        let id = design["id"].as_str().unwrap().to_string();
        let status = submit(
            &app,
            "Sam",
            json!({ id: { "design_quality": 4, "buy_intention": 2 } }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send_json(
            &app,
            json_request(
                "POST",
                "/api/admin/responses/reset",
                json!({ "password": ADMIN, "confirm": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid admin password");

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/admin/responses/reset",
                json!({ "password": "reset-secret" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, responses) = send_json(&app, admin_get("/api/admin/responses")).await;
        assert_eq!(responses.as_array().unwrap().len(), 1);

        let (status, report) = send_json(
            &app,
            json_request(
                "POST",
                "/api/admin/responses/reset",
                json!({ "password": "reset-secret", "confirm": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["deleted"], 1);

        let (_, responses) = send_json(&app, admin_get("/api/admin/responses")).await;
        assert!(responses.as_array().unwrap().is_empty());
    }
}
