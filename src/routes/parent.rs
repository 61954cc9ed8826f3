use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        upload::UploadStatus,
        user::{UpdateProfileRequest, User, UserProfile, UserRole},
    },
    routes::{require_role, ApiError},
    services::{
        children::ChildService,
        guidance::GuidanceService,
        parents::ParentService,
        uploads::UploadService,
        visits::VisitService,
    },
    AppState,
};

const RECENT_UPLOADS: usize = 5;

/// Parent endpoints are closed until the account is approved.
async fn current_parent(state: &AppState, user: &AuthenticatedUser) -> Result<User, ApiError> {
    require_role(user, UserRole::Parent)?;
    Ok(ParentService::require_approved(&state.db, user.user_id).await?)
}

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;

    let children = ChildService::list_for_parent(&state.db, parent.id).await?;
    let uploads = UploadService::list_for_parent(&state.db, parent.id).await?;
    let upcoming_visits = VisitService::upcoming_for_parent(&state.db, parent.id).await?;

    let count = |status: UploadStatus| uploads.iter().filter(|u| u.status() == status).count();
    let pending_uploads = count(UploadStatus::Pending);
    let verified_uploads = count(UploadStatus::Verified);
    let recent_uploads: Vec<_> = uploads.iter().take(RECENT_UPLOADS).collect();

    Ok(Json(json!({
        "parent": UserProfile::from(parent),
        "children": children,
        "recent_uploads": recent_uploads,
        "upcoming_visits": upcoming_visits,
        "pending_uploads": pending_uploads,
        "verified_uploads": verified_uploads,
    })))
}

pub async fn list_children(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;
    let children = ChildService::list_for_parent(&state.db, parent.id).await?;
    Ok(Json(json!(children)))
}

pub async fn list_uploads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;
    let uploads = UploadService::list_for_parent(&state.db, parent.id).await?;
    Ok(Json(json!(uploads)))
}

pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let parent = current_parent(&state, &user).await?;
    let upload = UploadService::upload(&state.db, &state.config.upload_dir, parent.id, multipart).await?;
    Ok((StatusCode::CREATED, Json(json!(upload))))
}

pub async fn list_visits(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;
    let visits = VisitService::list_for_parent(&state.db, parent.id).await?;
    Ok(Json(json!(visits)))
}

pub async fn list_guidance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    current_parent(&state, &user).await?;
    let items = GuidanceService::list(&state.db).await?;
    Ok(Json(json!(items)))
}

pub async fn profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;
    Ok(Json(json!(UserProfile::from(parent))))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let parent = current_parent(&state, &user).await?;
    let updated = ParentService::update_profile(&state.db, parent.id, &body).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully.",
        "user": UserProfile::from(updated),
    })))
}
