use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        child::CreateChildRequest,
        staff::CreateStaffRequest,
        user::{ApproveParentRequest, ParentQuery, UserRole},
    },
    routes::{require_role, ApiError},
    services::{
        children::ChildService,
        guidance::GuidanceService,
        parents::{self, ParentService},
        reports::ReportService,
        staff::StaffService,
        uploads::UploadService,
    },
    AppState,
};

const RECENT_LIMIT: i64 = 5;

fn require_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
    require_role(user, UserRole::Admin)
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;

    let summary = ReportService::summary(&state.db).await?;
    let recent_parents = ParentService::recent(&state.db, RECENT_LIMIT).await?;
    let recent_uploads = UploadService::recent(&state.db, RECENT_LIMIT).await?;

    Ok(Json(json!({
        "summary": summary,
        "recent_parents": recent_parents,
        "recent_uploads": recent_uploads,
    })))
}

// Staff

pub async fn list_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let staff = StaffService::list(&state.db).await?;
    Ok(Json(json!(staff)))
}

pub async fn create_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_admin(&user)?;
    let staff = StaffService::create(&state.db, state.config.bcrypt_cost, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(staff))))
}

pub async fn delete_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    StaffService::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Parents

pub async fn list_parents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let status = parents::parse_status_filter(query.status.as_deref())?;
    let parents = ParentService::list(&state.db, status).await?;
    Ok(Json(json!(parents)))
}

pub async fn approve_parent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ApproveParentRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let parent = ParentService::approve(&state.db, id, body.staff_id).await?;
    Ok(Json(json!({
        "message": format!(
            "Parent approved with ID {}",
            parent.parent_id.as_deref().unwrap_or_default()
        ),
        "parent": parent,
    })))
}

pub async fn reject_parent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let parent = ParentService::reject(&state.db, id).await?;
    Ok(Json(json!({ "message": "Parent registration rejected.", "parent": parent })))
}

// Children

pub async fn list_children(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let children = ChildService::list_all(&state.db).await?;
    Ok(Json(json!(children)))
}

pub async fn add_child(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateChildRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_admin(&user)?;
    let child = ChildService::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(child))))
}

// Guidance

pub async fn list_guidance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let items = GuidanceService::list(&state.db).await?;
    Ok(Json(json!(items)))
}

pub async fn create_guidance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_admin(&user)?;
    let item = GuidanceService::create(&state.db, &state.config.upload_dir, user.user_id, multipart).await?;
    Ok((StatusCode::CREATED, Json(json!(item))))
}

pub async fn delete_guidance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    GuidanceService::delete(&state.db, &state.config.upload_dir, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Reports

pub async fn report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user)?;
    let summary = ReportService::summary(&state.db).await?;
    Ok(Json(json!(summary)))
}

/// GET /admin/reports/export: CSV download of the summary counts.
pub async fn export_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, ApiError> {
    require_admin(&user)?;
    let summary = ReportService::summary(&state.db).await?;
    let csv = ReportService::to_csv(&summary).map_err(AppError::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"adoption_report.csv\""),
        ],
        csv,
    )
        .into_response())
}
