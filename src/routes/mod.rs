pub mod admin;
pub mod auth;
pub mod files;
pub mod health;
pub mod metrics;
pub mod parent;
pub mod staff;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppError,
    middleware::auth::JwtSecret,
    models::{auth::AuthenticatedUser, user::UserRole},
    AppState,
};

/// Error half of every JSON handler.
pub type ApiError = (StatusCode, Json<Value>);

/// Reject callers whose token carries another role.
pub(crate) fn require_role(user: &AuthenticatedUser, role: UserRole) -> Result<(), ApiError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied").into())
    }
}

fn cors(base_url: String) -> CorsLayer {
    // localhost is always allowed for development.
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());
    let body_limit = state.config.max_upload_bytes;
    let cors = cors(state.config.app_base_url.trim_end_matches('/').to_string());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        // Admin
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/staff", get(admin::list_staff).post(admin::create_staff))
        .route("/admin/staff/{id}", delete(admin::delete_staff))
        .route("/admin/parents", get(admin::list_parents))
        .route("/admin/parents/{id}/approve", post(admin::approve_parent))
        .route("/admin/parents/{id}/reject", post(admin::reject_parent))
        .route("/admin/children", get(admin::list_children))
        .route("/admin/children/add", post(admin::add_child))
        .route("/admin/guidance", get(admin::list_guidance).post(admin::create_guidance))
        .route("/admin/guidance/{id}", delete(admin::delete_guidance))
        .route("/admin/reports", get(admin::report))
        .route("/admin/reports/export", get(admin::export_report))
        // Staff
        .route("/staff/dashboard", get(staff::dashboard))
        .route("/staff/parents", get(staff::list_parents))
        .route("/staff/parents/{id}", get(staff::parent_detail))
        .route("/staff/uploads", get(staff::list_uploads))
        .route("/staff/uploads/{id}/verify", post(staff::verify_upload))
        .route("/staff/visits", get(staff::list_visits))
        .route("/staff/visits/add", post(staff::add_visit))
        .route("/staff/visits/{id}/complete", post(staff::complete_visit))
        .route("/staff/visits/{id}/cancel", post(staff::cancel_visit))
        // Parent
        .route("/parent/dashboard", get(parent::dashboard))
        .route("/parent/children", get(parent::list_children))
        .route("/parent/uploads", get(parent::list_uploads).post(parent::upload_document))
        .route("/parent/visits", get(parent::list_visits))
        .route("/parent/guidance", get(parent::list_guidance))
        .route("/parent/profile", get(parent::profile))
        .route("/parent/profile/update", post(parent::update_profile))
        // Stored files
        .route("/files/{*path}", get(files::serve_file))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
