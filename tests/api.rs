//! HTTP-level tests of the case-management workflows.
//!
//! Each test builds the full router over an in-memory SQLite database and a
//! temporary upload directory, then drives it with `oneshot` requests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use adoption_api::{
    config::Config,
    db,
    error::AppError,
    routes,
    services::{auth::AuthService, parents::ParentService},
    AppState,
};

const ADMIN_EMAIL: &str = "admin@adoption.com";
const ADMIN_PASSWORD: &str = "admin-pass";
const STAFF_PASSWORD: &str = "staff-pass";
const PARENT_PASSWORD: &str = "parent-pass";
const BOUNDARY: &str = "adoption-test-boundary";

struct TestApp {
    router: Router,
    pool: SqlitePool,
    upload_dir: tempfile::TempDir,
}

fn test_config(upload_dir: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        database_max_connections: 1,
        jwt_secret: "test-access-secret".into(),
        jwt_refresh_secret: "test-refresh-secret".into(),
        jwt_expiry_seconds: 3600,
        jwt_refresh_expiry_days: 30,
        upload_dir: upload_dir.into(),
        max_upload_bytes: 16 * 1024 * 1024,
        bcrypt_cost: 4,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost:8080".into(),
        default_admin_email: ADMIN_EMAIL.into(),
        default_admin_password: None,
        smtp_host: None,
        smtp_port: None,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
    }
}

/// File-backed database with several connections, for tests that race requests.
async fn shared_pool(dir: &tempfile::TempDir) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("adoption.db").display());
    let pool = db::create_pool(&url, 4).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn spawn_app() -> TestApp {
    // A single connection keeps every request on the same in-memory database.
    let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    AuthService::ensure_admin(&pool, "Admin", ADMIN_EMAIL, ADMIN_PASSWORD, 4)
        .await
        .unwrap();

    let upload_dir = tempfile::tempdir().unwrap();
    let config = test_config(upload_dir.path().to_str().unwrap());
    let state = AppState {
        db: pool.clone(),
        config: Arc::new(config),
        email: None,
    };

    TestApp {
        router: routes::router(state),
        pool,
        upload_dir,
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    for (name, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn is_parent_code(code: &str) -> bool {
    code.len() == 9 && code.starts_with("PAR") && code[3..].chars().all(|c| c.is_ascii_digit())
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(req).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn multipart(&self, uri: &str, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(req).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn login(&self, body: Value) -> (StatusCode, Value) {
        self.request("POST", "/auth/login", None, Some(body)).await
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .login(json!({ "role": "admin", "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn staff_token(&self, code: &str) -> String {
        let (status, body) = self
            .login(json!({ "role": "staff", "staff_id": code, "password": STAFF_PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn parent_token(&self, code: &str) -> String {
        let (status, body) = self
            .login(json!({ "role": "parent", "parent_id": code, "password": PARENT_PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn create_staff(&self, admin: &str, code: &str, max_parents: i64) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/admin/staff",
                Some(admin),
                Some(json!({
                    "name": format!("Caseworker {code}"),
                    "email": format!("{}@adoption.org", code.to_lowercase()),
                    "password": STAFF_PASSWORD,
                    "staff_id": code,
                    "max_parents": max_parents,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn register_parent(&self, email: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "name": "Jordan Parent",
                    "email": email,
                    "password": PARENT_PASSWORD,
                    "confirm_password": PARENT_PASSWORD,
                    "address": "12 Elm Street",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["user"]["status"], "pending");
        body["user"]["id"].as_i64().unwrap()
    }

    async fn approve(&self, admin: &str, parent_id: i64, staff_id: i64) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/admin/parents/{parent_id}/approve"),
            Some(admin),
            Some(json!({ "staff_id": staff_id })),
        )
        .await
    }

    async fn staff_count(&self, staff_id: i64) -> i64 {
        sqlx::query_scalar("SELECT assigned_parent_count FROM staff WHERE id = ?")
            .bind(staff_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Approved parent mentored by `staff_id`, with one child. Returns (user id, code, child id).
    async fn approved_family(&self, admin: &str, email: &str, staff_id: i64) -> (i64, String, i64) {
        let parent_id = self.register_parent(email).await;
        let (status, body) = self.approve(admin, parent_id, staff_id).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let code = body["parent"]["parent_id"].as_str().unwrap().to_string();

        let (status, child) = self
            .request(
                "POST",
                "/admin/children/add",
                Some(admin),
                Some(json!({ "parent_id": parent_id, "name": "Sam", "dob": "2019-04-02", "gender": "F" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{child}");

        (parent_id, code, child["id"].as_i64().unwrap())
    }
}

#[tokio::test]
async fn approval_issues_parent_code_and_counts_against_staff() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF001", 10).await;
    let parent_id = app.register_parent("jordan@example.com").await;
    assert_eq!(app.staff_count(staff_id).await, 0);

    let (status, body) = app.approve(&admin, parent_id, staff_id).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["parent"]["status"], "approved");
    assert_eq!(body["parent"]["staff_id"], staff_id);
    let code = body["parent"]["parent_id"].as_str().unwrap();
    assert!(is_parent_code(code), "unexpected code {code}");
    assert_eq!(app.staff_count(staff_id).await, 1);

    // The new code is the parent's login identifier.
    let token = app.parent_token(code).await;
    let (status, profile) = app.request("GET", "/parent/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["parent_id"], code);
    assert!(profile.get("password_hash").is_none());
}

#[tokio::test]
async fn approval_stops_at_staff_capacity() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF010", 1).await;
    let first = app.register_parent("first@example.com").await;
    let second = app.register_parent("second@example.com").await;

    let (status, _) = app.approve(&admin, first, staff_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.approve(&admin, second, staff_id).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(app.staff_count(staff_id).await, 1);

    let (status, pending) = app.request("GET", "/admin/parents?status=pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], second);
    assert!(pending[0]["parent_id"].is_null());
}

#[tokio::test]
async fn approval_rejects_invalid_requests() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF020", 10).await;
    let parent_id = app.register_parent("p@example.com").await;

    let (status, _) = app.approve(&admin, 9999, staff_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("POST", &format!("/admin/parents/{parent_id}/approve"), Some(&admin), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.approve(&admin, parent_id, 9999).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.approve(&admin, parent_id, staff_id).await;
    assert_eq!(status, StatusCode::OK);

    // Already approved: neither decision applies again, and the counter is untouched.
    let (status, _) = app.approve(&admin, parent_id, staff_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .request("POST", &format!("/admin/parents/{parent_id}/reject"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.staff_count(staff_id).await, 1);
}

#[tokio::test]
async fn rejected_parent_gets_no_code() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let parent_id = app.register_parent("r@example.com").await;

    let (status, body) = app
        .request("POST", &format!("/admin/parents/{parent_id}/reject"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["parent"]["status"], "rejected");
    assert!(body["parent"]["parent_id"].is_null());
}

#[tokio::test]
async fn registration_requires_matching_passwords_and_unique_email() {
    let app = spawn_app().await;

    let (status, _) = app
        .request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": "Casey",
                "email": "casey@example.com",
                "password": "one",
                "confirm_password": "two",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'casey@example.com'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    app.register_parent("casey@example.com").await;
    let (status, _) = app
        .request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "name": "Casey Again",
                "email": "casey@example.com",
                "password": "pw",
                "confirm_password": "pw",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_and_approval_gate() {
    let app = spawn_app().await;

    let (status, _) = app
        .login(json!({ "role": "admin", "email": ADMIN_EMAIL, "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .login(json!({ "role": "parent", "parent_id": "PAR000000", "password": PARENT_PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A parent row carrying a code while still pending is held at the gate.
    let parent_id = app.register_parent("gate@example.com").await;
    sqlx::query("UPDATE users SET parent_id = 'PAR123456' WHERE id = ?")
        .bind(parent_id)
        .execute(&app.pool)
        .await
        .unwrap();
    let (status, body) = app
        .login(json!({ "role": "parent", "parent_id": "PAR123456", "password": PARENT_PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("pending approval"));
}

#[tokio::test]
async fn first_staff_login_creates_exactly_one_user() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_staff(&admin, "STF030", 10).await;

    let pool = &app.pool;
    let count = || async move {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = 'stf030@adoption.org'")
            .fetch_one(pool)
            .await
            .unwrap()
    };
    assert_eq!(count().await, 0);

    let token = app.staff_token("STF030").await;
    assert_eq!(count().await, 1);
    app.staff_token("STF030").await;
    assert_eq!(count().await, 1);

    let (status, me) = app.request("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "staff");
    assert_eq!(me["status"], "approved");

    let (status, _) = app
        .login(json!({ "role": "staff", "staff_id": "STF030", "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_guards_apply() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF040", 10).await;
    let (_, code, _) = app.approved_family(&admin, "guard@example.com", staff_id).await;
    let parent = app.parent_token(&code).await;
    let staff = app.staff_token("STF040").await;

    let (status, _) = app.request("GET", "/admin/staff", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request("GET", "/admin/staff", Some(&parent), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("GET", "/staff/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request("GET", "/parent/dashboard", Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn document_review_by_mentor_only_and_once() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let mentor_id = app.create_staff(&admin, "STF050", 10).await;
    app.create_staff(&admin, "STF051", 10).await;
    let (_, code, child_id) = app.approved_family(&admin, "docs@example.com", mentor_id).await;
    let parent = app.parent_token(&code).await;

    let child = child_id.to_string();
    let (status, upload) = app
        .multipart(
            "/parent/uploads",
            &parent,
            multipart_body(
                &[("child_id", child.as_str()), ("upload_type", "vaccination")],
                &[("file", "card.pdf", &b"%PDF-1.4 card"[..])],
            ),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{upload}");
    assert_eq!(upload["status"], "pending");
    let file_path = upload["file_path"].as_str().unwrap();
    assert!(file_path.starts_with("documents/") && file_path.ends_with(".pdf"));
    assert!(app.upload_dir.path().join(file_path).is_file());
    let upload_id = upload["id"].as_i64().unwrap();

    let mentor = app.staff_token("STF050").await;
    let other = app.staff_token("STF051").await;

    let (status, pending) = app.request("GET", "/staff/uploads", Some(&mentor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    let (_, none) = app.request("GET", "/staff/uploads", Some(&other), None).await;
    assert!(none.as_array().unwrap().is_empty());

    let verify = |token: String, action: &'static str| {
        let app = &app;
        async move {
            app.request(
                "POST",
                &format!("/staff/uploads/{upload_id}/verify"),
                Some(&token),
                Some(json!({ "action": action, "feedback": "Checked" })),
            )
            .await
        }
    };

    let (status, _) = verify(other.clone(), "approve").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = verify(mentor.clone(), "archive").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reviewed) = verify(mentor.clone(), "approve").await;
    assert_eq!(status, StatusCode::OK, "{reviewed}");
    assert_eq!(reviewed["status"], "verified");
    assert_eq!(reviewed["verified_by"], mentor_id);
    assert_eq!(reviewed["feedback"], "Checked");
    assert!(!reviewed["verified_at"].is_null());

    // Terminal: neither a second approval nor a rejection changes it.
    let (status, _) = verify(mentor.clone(), "reject").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let stored: String = sqlx::query_scalar("SELECT status FROM uploads WHERE id = ?")
        .bind(upload_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, "verified");

    let (_, mine) = app.request("GET", "/parent/uploads", Some(&parent), None).await;
    assert_eq!(mine[0]["status"], "verified");
}

#[tokio::test]
async fn parent_upload_validation() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF060", 10).await;
    let (_, code, child_id) = app.approved_family(&admin, "a@example.com", staff_id).await;
    let (_, _, foreign_child) = app.approved_family(&admin, "b@example.com", staff_id).await;
    let parent = app.parent_token(&code).await;

    let own = child_id.to_string();
    let foreign = foreign_child.to_string();

    let (status, _) = app
        .multipart(
            "/parent/uploads",
            &parent,
            multipart_body(&[("child_id", foreign.as_str()), ("upload_type", "health")], &[("file", "x.pdf", &b"x"[..])]),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .multipart(
            "/parent/uploads",
            &parent,
            multipart_body(&[("child_id", own.as_str()), ("upload_type", "passport")], &[("file", "x.pdf", &b"x"[..])]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .multipart(
            "/parent/uploads",
            &parent,
            multipart_body(&[("child_id", own.as_str()), ("upload_type", "school")], &[]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn visit_lifecycle_is_limited_to_assigned_staff() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let mentor_id = app.create_staff(&admin, "STF070", 10).await;
    app.create_staff(&admin, "STF071", 10).await;
    let (parent_id, code, _) = app.approved_family(&admin, "visit@example.com", mentor_id).await;
    let mentor = app.staff_token("STF070").await;
    let other = app.staff_token("STF071").await;

    let schedule = |token: String| {
        let app = &app;
        async move {
            app.request(
                "POST",
                "/staff/visits/add",
                Some(&token),
                Some(json!({ "parent_id": parent_id, "visit_date": "2099-06-01", "remarks": "First home visit" })),
            )
            .await
        }
    };

    let (status, _) = schedule(other.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, visit) = schedule(mentor.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{visit}");
    assert_eq!(visit["status"], "scheduled");
    let visit_id = visit["id"].as_i64().unwrap();

    let complete_uri = format!("/staff/visits/{visit_id}/complete");
    let (status, _) = app
        .multipart(&complete_uri, &other, multipart_body(&[("remarks", "done")], &[]))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, done) = app
        .multipart(
            &complete_uri,
            &mentor,
            multipart_body(&[("remarks", "Child settling in well")], &[("photos", "garden.jpg", &b"\xff\xd8jpeg"[..])]),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["status"], "completed");
    assert_eq!(done["remarks"], "Child settling in well");
    let photos = done["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    let photo = photos[0].as_str().unwrap();
    assert!(photo.starts_with("visits/") && photo.ends_with(".jpg"));

    // Stored photos are served to authenticated users.
    let (status, bytes) = app
        .send(
            Request::builder()
                .uri(format!("/files/{photo}"))
                .header(header::AUTHORIZATION, format!("Bearer {mentor}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"\xff\xd8jpeg");

    let (status, _) = app
        .multipart(&complete_uri, &mentor, multipart_body(&[("remarks", "again")], &[]))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .request("POST", &format!("/staff/visits/{visit_id}/cancel"), Some(&mentor), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, second) = schedule(mentor.clone()).await;
    let second_id = second["id"].as_i64().unwrap();
    let (status, cancelled) = app
        .request("POST", &format!("/staff/visits/{second_id}/cancel"), Some(&mentor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, scheduled) = app.request("GET", "/staff/visits?status=scheduled", Some(&mentor), None).await;
    assert!(scheduled.as_array().unwrap().is_empty());

    let parent = app.parent_token(&code).await;
    let (status, visits) = app.request("GET", "/parent/visits", Some(&parent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visits.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn staff_only_sees_assigned_parents() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let mentor_id = app.create_staff(&admin, "STF080", 10).await;
    let other_id = app.create_staff(&admin, "STF081", 10).await;
    let (mine, _, _) = app.approved_family(&admin, "mine@example.com", mentor_id).await;
    let (theirs, _, _) = app.approved_family(&admin, "theirs@example.com", other_id).await;
    let mentor = app.staff_token("STF080").await;

    let (status, detail) = app.request("GET", &format!("/staff/parents/{mine}"), Some(&mentor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["children"].as_array().unwrap().len(), 1);

    let (status, _) = app.request("GET", &format!("/staff/parents/{theirs}"), Some(&mentor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, dashboard) = app.request("GET", "/staff/dashboard", Some(&mentor), None).await;
    assert_eq!(dashboard["assigned_parents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn staff_with_parents_cannot_be_deleted() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let busy = app.create_staff(&admin, "STF090", 10).await;
    let idle = app.create_staff(&admin, "STF091", 10).await;
    app.approved_family(&admin, "busy@example.com", busy).await;
    app.staff_token("STF091").await;

    let (status, _) = app.request("DELETE", &format!("/admin/staff/{busy}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.request("DELETE", &format!("/admin/staff/{idle}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let logins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'stf091@adoption.org'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(logins, 0);

    // Duplicate staff codes are refused.
    let (status, _) = app
        .request(
            "POST",
            "/admin/staff",
            Some(&admin),
            Some(json!({ "name": "Dup", "email": "dup@adoption.org", "password": "pw", "staff_id": "STF090" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn report_export_is_csv_attachment() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF100", 10).await;
    app.approved_family(&admin, "csv@example.com", staff_id).await;
    app.register_parent("waiting@example.com").await;

    let (status, summary) = app.request("GET", "/admin/reports", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_parents"], 1);
    assert_eq!(summary["pending_parents"], 1);

    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/reports/export")
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert!(res.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("adoption_report.csv"));

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(
        csv,
        "Report Type,Count\nTotal Staff,1\nTotal Parents,1\nTotal Children,1\nTotal Uploads,0\nPending Uploads,0\n"
    );
}

#[tokio::test]
async fn guidance_is_published_and_removed_with_its_file() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF110", 10).await;
    let (_, code, _) = app.approved_family(&admin, "reader@example.com", staff_id).await;

    let (status, item) = app
        .multipart(
            "/admin/guidance",
            &admin,
            multipart_body(
                &[("title", "Attachment basics"), ("category", "guideline")],
                &[("file", "basics.pdf", &b"%PDF guide"[..])],
            ),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    let file_url = item["file_url"].as_str().unwrap().to_string();
    assert!(app.upload_dir.path().join(&file_url).is_file());

    let (status, _) = app
        .multipart("/admin/guidance", &admin, multipart_body(&[("title", "Bad"), ("category", "memo")], &[]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let parent = app.parent_token(&code).await;
    let (status, list) = app.request("GET", "/parent/guidance", Some(&parent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let id = item["id"].as_i64().unwrap();
    let (status, _) = app.request("DELETE", &format!("/admin/guidance/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!app.upload_dir.path().join(&file_url).exists());
}

#[tokio::test]
async fn refresh_tokens_rotate_and_logout_revokes() {
    let app = spawn_app().await;
    let (status, first) = app
        .login(json!({ "role": "admin", "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let old = first["refresh_token"].as_str().unwrap();

    let (status, second) = app
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": old })))
        .await;
    assert_eq!(status, StatusCode::OK, "{second}");
    let new = second["refresh_token"].as_str().unwrap();

    let (status, _) = app
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": old })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request("POST", "/auth/logout", None, Some(json!({ "refresh_token": new })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": new })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_password_reset_updates_staff_login() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_staff(&admin, "STF120", 10).await;

    let (status, _) = app
        .request("POST", "/auth/forgot-password", None, Some(json!({ "email": "stf120@adoption.org" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown addresses get the same answer.
    let (status, _) = app
        .request("POST", "/auth/forgot-password", None, Some(json!({ "email": "ghost@example.com" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let token: String = sqlx::query_scalar("SELECT token FROM password_reset_tokens ORDER BY id DESC LIMIT 1")
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let (status, body) = app
        .request(
            "POST",
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "new_password": "fresh-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .login(json!({ "role": "staff", "staff_id": "STF120", "password": "fresh-pass" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single use.
    let (status, _) = app
        .request(
            "POST",
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "new_password": "another" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_resets_consume_the_token_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = shared_pool(&dir).await;
    AuthService::ensure_admin(&pool, "Admin", ADMIN_EMAIL, ADMIN_PASSWORD, 4)
        .await
        .unwrap();
    AuthService::request_password_reset(&pool, None, "http://localhost:8080", ADMIN_EMAIL)
        .await
        .unwrap();
    let token: String = sqlx::query_scalar("SELECT token FROM password_reset_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        AuthService::reset_password(&pool, 4, &token, "first-new"),
        AuthService::reset_password(&pool, 4, &token, "second-new"),
    );

    let (winner, loser) = match (first, second) {
        (Ok(()), Err(e)) => ("first-new", e),
        (Err(e), Ok(())) => ("second-new", e),
        other => panic!("expected exactly one reset to succeed, got {other:?}"),
    };
    assert!(matches!(loser, AppError::BadRequest(_)), "{loser:?}");

    let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE email = ?")
        .bind(ADMIN_EMAIL)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(bcrypt::verify(winner, &hash).unwrap());
}

#[tokio::test]
async fn concurrent_approvals_respect_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let pool = shared_pool(&dir).await;

    let staff_id: i64 = sqlx::query_scalar(
        "INSERT INTO staff (name, email, password_hash, staff_id, max_parents)
         VALUES ('Casey Worker', 'casey@adoption.org', 'x', 'STF900', 1)
         RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let mut parents = Vec::new();
    for i in 0..4 {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, name, role, status)
             VALUES (?, 'x', 'Waiting Parent', 'parent', 'pending')
             RETURNING id",
        )
        .bind(format!("waiting{i}@example.com"))
        .fetch_one(&pool)
        .await
        .unwrap();
        parents.push(id);
    }

    let (a, b, c, d) = tokio::join!(
        ParentService::approve(&pool, parents[0], Some(staff_id)),
        ParentService::approve(&pool, parents[1], Some(staff_id)),
        ParentService::approve(&pool, parents[2], Some(staff_id)),
        ParentService::approve(&pool, parents[3], Some(staff_id)),
    );
    let results = [a, b, c, d];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    }

    let count: i64 = sqlx::query_scalar("SELECT assigned_parent_count FROM staff WHERE id = ?")
        .bind(staff_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn profile_update_keeps_blank_fields() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let staff_id = app.create_staff(&admin, "STF130", 10).await;
    let (_, code, _) = app.approved_family(&admin, "rivera@example.com", staff_id).await;
    let token = app.parent_token(&code).await;

    let (status, body) = app
        .request(
            "POST",
            "/parent/profile/update",
            Some(&token),
            Some(json!({ "name": "Jordan Rivera", "address": "   ", "phone": "555-0100" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["name"], "Jordan Rivera");
    assert_eq!(body["user"]["address"], "12 Elm Street");
    assert_eq!(body["user"]["phone"], "555-0100");
    assert_eq!(body["user"]["parent_id"], code);

    let (_, profile) = app.request("GET", "/parent/profile", Some(&token), None).await;
    assert_eq!(profile["name"], "Jordan Rivera");
    assert_eq!(profile["address"], "12 Elm Street");
}

#[tokio::test]
async fn pending_parent_cannot_update_profile() {
    let app = spawn_app().await;
    let parent_id = app.register_parent("waiting@example.com").await;

    // Pending parents cannot log in, so mint their token directly.
    let parent = AuthService::find_user(&app.pool, parent_id).await.unwrap();
    let token = AuthService::generate_access_token(&parent, "test-access-secret", 3600).unwrap();

    let (status, _) = app
        .request(
            "POST",
            "/parent/profile/update",
            Some(&token),
            Some(json!({ "name": "Someone Else" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let name: String = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
        .bind(parent_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(name, "Jordan Parent");
}

#[tokio::test]
async fn admin_bootstrap_refuses_staff_email() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.create_staff(&admin, "STF140", 10).await;

    let res = AuthService::ensure_admin(&app.pool, "Second Admin", "stf140@adoption.org", "pw", 4).await;
    assert!(matches!(res, Err(AppError::Conflict(_))), "{res:?}");

    // The staff member's first login still materializes their account.
    app.staff_token("STF140").await;
    assert!(!AuthService::ensure_admin(&app.pool, "Admin", ADMIN_EMAIL, "other", 4).await.unwrap());
}

#[tokio::test]
async fn health_reports_database() {
    let app = spawn_app().await;
    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["db"], "connected");
}
