use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        staff::Staff,
        upload::{UploadQuery, VerifyUploadRequest},
        user::UserRole,
        visit::{CreateVisitRequest, VisitQuery},
    },
    routes::{require_role, ApiError},
    services::{
        staff::StaffService,
        uploads::{self, UploadService},
        visits::{self, VisitService},
    },
    AppState,
};

/// Staff record of the caller; only staff tokens get one.
async fn current_staff(state: &AppState, user: &AuthenticatedUser) -> Result<Staff, ApiError> {
    require_role(user, UserRole::Staff)?;
    Ok(StaffService::for_user(&state.db, user.user_id).await?)
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let dashboard = StaffService::dashboard(&state.db, staff).await?;
    Ok(Json(json!(dashboard)))
}

pub async fn list_parents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let parents = StaffService::assigned_parents(&state.db, staff.id).await?;
    Ok(Json(json!(parents)))
}

pub async fn parent_detail(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let detail = StaffService::parent_detail(&state.db, staff.id, id).await?;
    Ok(Json(json!(detail)))
}

pub async fn list_uploads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UploadQuery>,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let status = uploads::parse_status_filter(query.status.as_deref())?;
    let uploads = UploadService::list_for_staff(&state.db, staff.id, status).await?;
    Ok(Json(json!(uploads)))
}

pub async fn verify_upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<VerifyUploadRequest>,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let upload = UploadService::verify(&state.db, &staff, id, &body).await?;
    Ok(Json(json!(upload)))
}

pub async fn list_visits(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<VisitQuery>,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let status = visits::parse_status_filter(query.status.as_deref())?;
    let visits = VisitService::list_for_staff(&state.db, staff.id, status).await?;
    Ok(Json(json!(visits)))
}

pub async fn add_visit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateVisitRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let staff = current_staff(&state, &user).await?;
    let visit = VisitService::create(&state.db, &staff, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(visit))))
}

pub async fn complete_visit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let visit = VisitService::complete(&state.db, &state.config.upload_dir, &staff, id, multipart).await?;
    Ok(Json(json!(visit)))
}

pub async fn cancel_visit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let staff = current_staff(&state, &user).await?;
    let visit = VisitService::cancel(&state.db, &staff, id).await?;
    Ok(Json(json!(visit)))
}
