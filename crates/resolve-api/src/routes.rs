use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use resolve_engine::files::MAX_ATTACHMENT_SIZE;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{admin, complaints, notifications};

/// Multipart framing and the JSON part ride on top of the attachment itself.
const BODY_LIMIT: usize = MAX_ATTACHMENT_SIZE + 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(admin::health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/complaints",
            get(complaints::list_complaints).post(complaints::submit_complaint),
        )
        .route("/complaints/me", get(complaints::my_complaints))
        .route("/complaints/stats", get(complaints::statistics))
        .route("/complaints/export", get(complaints::export_csv))
        .route(
            "/complaints/{id}",
            get(complaints::get_complaint)
                .put(complaints::update_complaint)
                .delete(complaints::delete_complaint),
        )
        .route("/complaints/{id}/timeline", get(complaints::get_timeline))
        .route("/complaints/{id}/attachments", get(complaints::get_attachments))
        .route("/complaints/{id}/assign", post(complaints::assign_complaint))
        .route("/complaints/{id}/comment", post(complaints::add_comment))
        .route("/complaints/{id}/resolve", post(complaints::resolve_complaint))
        .route("/complaints/{id}/close", post(complaints::close_complaint))
        .route("/complaints/{id}/reopen", post(complaints::reopen_complaint))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/me", get(notifications::list_notifications))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/users", get(admin::list_users))
        .route("/admin/escalations/run", post(admin::run_escalations))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use resolve_db::Database;
    use resolve_engine::files::DiskStore;
    use resolve_engine::{Engine, EscalationPolicy, LogOutbound, SystemClock};

    use crate::auth::AppStateInner;

    const BOUNDARY: &str = "resolveit-test-boundary";

    struct TestApp {
        app: Router,
        _uploads: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let db = Arc::new(Database::open_in_memory().unwrap());
            let files = Arc::new(DiskStore::new(uploads.path().to_path_buf()).unwrap());
            let engine = Engine::new(
                db.clone(),
                files,
                Arc::new(LogOutbound),
                Arc::new(SystemClock),
            );
            let escalator = Arc::new(engine.escalator(EscalationPolicy::default()));
            let state = Arc::new(AppStateInner {
                db,
                engine,
                escalator,
                jwt_secret: "test-secret".into(),
            });
            Self {
                app: router(state),
                _uploads: uploads,
            }
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
            let resp = self.app.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            (status, body.to_vec())
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let req = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let (status, bytes) = self.send(req).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn register(&self, email: &str, role: &str) -> String {
            let (status, body) = self
                .json(
                    Method::POST,
                    "/auth/register",
                    None,
                    Some(json!({
                        "name": "Test Person",
                        "email": email,
                        "password": "hunter22",
                        "role": role,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["token"].as_str().unwrap().to_string()
        }

        async fn submit(&self, token: &str, complaint: Value, file: Option<&[u8]>) -> (StatusCode, Value) {
            let mut body = Vec::new();
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"complaint\"\r\nContent-Type: application/json\r\n\r\n{}\r\n",
                    complaint
                )
                .as_bytes(),
            );
            if let Some(file) = file {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(file);
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

            let req = Request::builder()
                .method(Method::POST)
                .uri("/complaints")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            let (status, bytes) = self.send(req).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    fn leak_complaint() -> Value {
        json!({
            "category": "Hostel",
            "title": "Water leak in room 214",
            "description": "Ceiling drips whenever it rains",
        })
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let t = TestApp::new();
        let (status, body) = t.json(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let t = TestApp::new();
        let (status, _) = t.json(Method::GET, "/complaints/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = t
            .json(Method::GET, "/complaints/me", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validation_and_login() {
        let t = TestApp::new();
        let (status, _) = t
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": "A", "email": "no-at-sign", "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = t
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": "A", "email": "a@example.com", "password": "123" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        t.register("student@example.com", "user").await;

        let (status, _) = t
            .json(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": "B", "email": "student@example.com", "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = t
            .json(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "student@example.com", "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "USER");

        let (status, _) = t
            .json(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "student@example.com", "password": "wrong-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_staff_only_routes_reject_users() {
        let t = TestApp::new();
        let token = t.register("student@example.com", "USER").await;

        for uri in ["/complaints", "/complaints/stats", "/complaints/export", "/users"] {
            let (status, _) = t.json(Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
        let (status, _) = t
            .json(Method::POST, "/admin/escalations/run", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submit_with_attachment_then_resolve() {
        let t = TestApp::new();
        let student = t.register("student@example.com", "USER").await;
        let admin = t.register("admin@example.com", "admin").await;

        let (status, complaint) = t
            .submit(&student, leak_complaint(), Some(b"\xff\xd8\xff fake jpeg"))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(complaint["status"], "NEW");
        assert_eq!(complaint["priority"], "MEDIUM");
        let id = complaint["id"].as_str().unwrap().to_string();

        let (status, attachments) = t
            .json(Method::GET, &format!("/complaints/{id}/attachments"), Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(attachments[0]["fileName"], "photo.jpg");
        assert_eq!(attachments[0]["fileSize"], 13);

        let (status, mine) = t.json(Method::GET, "/complaints/me", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let (status, resolved) = t
            .json(
                Method::POST,
                &format!("/complaints/{id}/resolve"),
                Some(&admin),
                Some(json!({ "comment": "Roof patched" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["status"], "RESOLVED");
        assert!(resolved["resolvedAt"].is_string());

        let (status, timeline) = t
            .json(Method::GET, &format!("/complaints/{id}/timeline"), Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(timeline[0]["status"], "RESOLVED");
        assert_eq!(timeline[0]["comment"], "Roof patched");

        let (status, inbox) = t
            .json(Method::GET, "/notifications?unread=true", Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = inbox
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["title"].as_str())
            .collect();
        assert!(titles.contains(&"Grievance Resolved"));
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_payload() {
        let t = TestApp::new();
        let token = t.register("student@example.com", "USER").await;

        let req = Request::builder()
            .method(Method::POST)
            .uri("/complaints")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"complaint\"\r\n\r\n{{not json\r\n--{BOUNDARY}--\r\n"
            )))
            .unwrap();
        let (status, _) = t.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_anonymous_submission_is_not_owned() {
        let t = TestApp::new();
        let token = t.register("student@example.com", "USER").await;

        let mut body = leak_complaint();
        body["isAnonymous"] = json!(true);
        body["anonymousEmail"] = json!("whistle@example.com");
        let (status, complaint) = t.submit(&token, body, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(complaint["userId"].is_null());
        assert_eq!(complaint["isAnonymous"], true);

        let (_, mine) = t.json(Method::GET, "/complaints/me", Some(&token), None).await;
        assert!(mine.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_users_cannot_touch_a_complaint() {
        let t = TestApp::new();
        let owner = t.register("student@example.com", "USER").await;
        let stranger = t.register("roommate@example.com", "USER").await;
        let admin = t.register("admin@example.com", "ADMIN").await;

        let (_, complaint) = t
            .submit(&owner, leak_complaint(), Some(b"evidence"))
            .await;
        let id = complaint["id"].as_str().unwrap().to_string();

        let attempts = [
            (Method::GET, format!("/complaints/{id}"), None),
            (Method::GET, format!("/complaints/{id}/timeline"), None),
            (Method::GET, format!("/complaints/{id}/attachments"), None),
            (
                Method::POST,
                format!("/complaints/{id}/comment"),
                Some(json!({ "comment": "Not mine" })),
            ),
            (Method::POST, format!("/complaints/{id}/close"), None),
            (
                Method::POST,
                format!("/complaints/{id}/reopen"),
                Some(json!({ "reason": "Not mine either" })),
            ),
        ];
        for (method, uri, body) in attempts {
            let (status, _) = t.json(method.clone(), &uri, Some(&stranger), body).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        }

        let (status, current) = t
            .json(Method::GET, &format!("/complaints/{id}"), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["status"], "NEW");

        let (_, timeline) = t
            .json(Method::GET, &format!("/complaints/{id}/timeline"), Some(&admin), None)
            .await;
        assert_eq!(timeline.as_array().unwrap().len(), 1);

        let (status, closed) = t
            .json(Method::POST, &format!("/complaints/{id}/close"), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["status"], "CLOSED");
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_to_recipient() {
        let t = TestApp::new();
        let owner = t.register("student@example.com", "USER").await;
        let stranger = t.register("roommate@example.com", "USER").await;
        t.submit(&owner, leak_complaint(), None).await;

        let (status, inbox) = t
            .json(Method::GET, "/notifications/me", Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let note_id = inbox[0]["id"].as_str().unwrap().to_string();

        let (status, _) = t
            .json(Method::POST, &format!("/notifications/{note_id}/read"), Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, unread) = t
            .json(Method::GET, "/notifications?unread=true", Some(&owner), None)
            .await;
        assert_eq!(unread.as_array().unwrap().len(), 1);

        let (status, _) = t
            .json(Method::POST, &format!("/notifications/{note_id}/read"), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, unread) = t
            .json(Method::GET, "/notifications?unread=true", Some(&owner), None)
            .await;
        assert!(unread.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_complaint_is_dropped() {
        let t = TestApp::new();
        let token = t.register("student@example.com", "USER").await;

        let (status, body) = t
            .json(
                Method::POST,
                &format!("/complaints/{}/comment", uuid::Uuid::new_v4()),
                Some(&token),
                Some(json!({ "comment": "Any update?" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_missing_complaint_is_not_found() {
        let t = TestApp::new();
        let admin = t.register("admin@example.com", "ADMIN").await;
        let missing = uuid::Uuid::new_v4();

        let (status, _) = t
            .json(Method::GET, &format!("/complaints/{missing}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = t
            .json(Method::DELETE, &format!("/complaints/{missing}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_and_stats_for_staff() {
        let t = TestApp::new();
        let student = t.register("student@example.com", "USER").await;
        let admin = t.register("admin@example.com", "ADMIN").await;
        t.submit(&student, leak_complaint(), None).await;

        let (status, stats) = t
            .json(Method::GET, "/complaints/stats", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["open"], 1);
        assert_eq!(stats["categories"]["Hostel"], 1);

        let req = Request::builder()
            .uri("/complaints/export")
            .header(header::AUTHORIZATION, format!("Bearer {}", admin))
            .body(Body::empty())
            .unwrap();
        let resp = t.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        let csv = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(csv.to_vec()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().contains("student@example.com"));
    }

    #[tokio::test]
    async fn test_manual_sweep_reports_nothing_for_fresh_complaints() {
        let t = TestApp::new();
        let student = t.register("student@example.com", "USER").await;
        let admin = t.register("admin@example.com", "ADMIN").await;
        t.submit(&student, leak_complaint(), None).await;

        let (status, report) = t
            .json(Method::POST, "/admin/escalations/run", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(report["escalated"].as_array().unwrap().is_empty());
        assert!(report["failed"].as_array().unwrap().is_empty());
    }
}
