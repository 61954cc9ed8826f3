use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};

use crate::{
    error::AppError,
    models::auth::AuthenticatedUser,
    routes::ApiError,
    services::storage,
    AppState,
};

/// GET /files/{*path}: stored documents, guidance files and visit photos.
/// Any authenticated user may read; the path must stay inside the upload root.
pub async fn serve_file(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let file_path = storage::resolve(&state.config.upload_dir, &path).await?;

    let bytes = tokio::fs::read(&file_path).await.map_err(AppError::from)?;
    let content_type = mime_guess::from_path(&file_path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.into()).into())
}
