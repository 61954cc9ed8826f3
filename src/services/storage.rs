use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Parent document uploads.
pub const DOCUMENTS_DIR: &str = "documents";
/// Files attached to guidance material.
pub const GUIDANCE_DIR: &str = "guidance";
/// Photos taken during home visits.
pub const VISITS_DIR: &str = "visits";

/// A file part read from a multipart form.
pub struct IncomingFile {
    pub filename: String,
    pub bytes: bytes::Bytes,
}

/// Keep only a short alphanumeric extension from the client-supplied name.
fn safe_extension(original_filename: &str) -> String {
    Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// Write `file` under `<upload_dir>/<subdir>/` with a generated unique name.
/// Returns the path relative to `upload_dir`, which is what gets stored in the DB.
pub async fn save(upload_dir: &str, subdir: &str, file: &IncomingFile) -> AppResult<String> {
    let dir = PathBuf::from(upload_dir).join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let storage_filename = format!("{}.{}", Uuid::new_v4(), safe_extension(&file.filename));
    tokio::fs::write(dir.join(&storage_filename), &file.bytes).await?;

    Ok(format!("{subdir}/{storage_filename}"))
}

/// Best-effort removal; a missing file is not an error.
pub async fn remove(upload_dir: &str, relative_path: &str) {
    let path = PathBuf::from(upload_dir).join(relative_path);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove stored file {}: {e}", path.display());
        }
    }
}

/// Resolve a stored relative path, refusing anything that escapes `upload_dir`.
pub async fn resolve(upload_dir: &str, relative_path: &str) -> AppResult<PathBuf> {
    let root = tokio::fs::canonicalize(upload_dir)
        .await
        .map_err(|_| AppError::NotFound("File not found"))?;
    let file = tokio::fs::canonicalize(root.join(relative_path))
        .await
        .map_err(|_| AppError::NotFound("File not found"))?;
    if !file.starts_with(&root) {
        return Err(AppError::Forbidden("Access denied"));
    }
    let is_file = tokio::fs::metadata(&file).await.map(|m| m.is_file()).unwrap_or(false);
    if !is_file {
        return Err(AppError::NotFound("File not found"));
    }
    Ok(file)
}
