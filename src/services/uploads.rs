use axum::extract::Multipart;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, AppResult},
    models::{
        staff::Staff,
        upload::{Upload, UploadStatus, UploadType, VerifyAction, VerifyUploadRequest, UPLOAD_COLS},
    },
    services::{
        children::ChildService,
        metrics::{DOCUMENT_UPLOADS_COUNTER, VERIFICATIONS_COUNTER},
        staff::prefixed,
        storage::{self, IncomingFile, DOCUMENTS_DIR},
    },
};

/// `None` and `"pending"` select pending uploads; `"all"` disables the filter.
pub fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<UploadStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Some(UploadStatus::Pending)),
        Some("all") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Unknown status filter: {s}"))),
    }
}

pub struct UploadService;

impl UploadService {
    /// Store a parent's document for one of their children.
    /// Fields: `child_id`, `upload_type` (health | vaccination | school), `file`.
    pub async fn upload(
        pool: &SqlitePool,
        upload_dir: &str,
        parent_id: i64,
        mut multipart: Multipart,
    ) -> AppResult<Upload> {
        let mut file: Option<IncomingFile> = None;
        let mut child_id: Option<i64> = None;
        let mut upload_type: Option<String> = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or("").to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if !filename.is_empty() && !bytes.is_empty() {
                        file = Some(IncomingFile { filename, bytes });
                    }
                }
                "child_id" => {
                    child_id = field.text().await?.trim().parse().ok();
                }
                "upload_type" => {
                    upload_type = Some(field.text().await?.trim().to_string());
                }
                _ => {}
            }
        }

        let child_id = child_id.ok_or_else(|| AppError::bad_request("Please select a child."))?;
        let upload_type: UploadType = upload_type
            .as_deref()
            .unwrap_or("")
            .parse()
            .map_err(|_| AppError::bad_request("Upload type must be health, vaccination or school."))?;
        let file = file.ok_or_else(|| AppError::bad_request("No file selected."))?;

        ChildService::find_for_parent(pool, parent_id, child_id).await?;

        let file_path = storage::save(upload_dir, DOCUMENTS_DIR, &file).await?;

        let inserted = sqlx::query_as::<_, Upload>(&format!(
            "INSERT INTO uploads (parent_id, child_id, upload_type, file_path)
             VALUES (?, ?, ?, ?)
             RETURNING {UPLOAD_COLS}"
        ))
        .bind(parent_id)
        .bind(child_id)
        .bind(upload_type.as_str())
        .bind(&file_path)
        .fetch_one(pool)
        .await;

        let upload = match inserted {
            Ok(upload) => upload,
            Err(e) => {
                storage::remove(upload_dir, &file_path).await;
                return Err(e.into());
            }
        };

        DOCUMENT_UPLOADS_COUNTER.with_label_values(&[upload_type.as_str()]).inc();
        tracing::info!(upload_id = upload.id, parent_id, child_id, "document uploaded");
        Ok(upload)
    }

    pub async fn list_for_parent(pool: &SqlitePool, parent_id: i64) -> AppResult<Vec<Upload>> {
        let uploads = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {UPLOAD_COLS} FROM uploads
             WHERE parent_id = ?
             ORDER BY upload_date DESC, id DESC"
        ))
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(uploads)
    }

    /// Uploads of the parents mentored by `staff_id`.
    pub async fn list_for_staff(
        pool: &SqlitePool,
        staff_id: i64,
        status: Option<UploadStatus>,
    ) -> AppResult<Vec<Upload>> {
        let cols = prefixed(UPLOAD_COLS, "up");
        let uploads = match status {
            Some(status) => {
                sqlx::query_as::<_, Upload>(&format!(
                    "SELECT {cols} FROM uploads up
                     JOIN users u ON u.id = up.parent_id
                     WHERE u.staff_id = ? AND up.status = ?
                     ORDER BY up.upload_date DESC, up.id DESC"
                ))
                .bind(staff_id)
                .bind(status.as_str())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Upload>(&format!(
                    "SELECT {cols} FROM uploads up
                     JOIN users u ON u.id = up.parent_id
                     WHERE u.staff_id = ?
                     ORDER BY up.upload_date DESC, up.id DESC"
                ))
                .bind(staff_id)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(uploads)
    }

    pub async fn recent(pool: &SqlitePool, limit: i64) -> AppResult<Vec<Upload>> {
        let uploads = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {UPLOAD_COLS} FROM uploads ORDER BY upload_date DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(uploads)
    }

    /// pending → verified | rejected, by the mentor of the owning parent only.
    pub async fn verify(
        pool: &SqlitePool,
        staff: &Staff,
        upload_id: i64,
        req: &VerifyUploadRequest,
    ) -> AppResult<Upload> {
        let row: Option<(String, Option<i64>)> = sqlx::query_as(
            "SELECT up.status, u.staff_id FROM uploads up
             JOIN users u ON u.id = up.parent_id
             WHERE up.id = ?",
        )
        .bind(upload_id)
        .fetch_optional(pool)
        .await?;

        let (status, mentor) = row.ok_or(AppError::NotFound("Upload not found"))?;
        if mentor != Some(staff.id) {
            return Err(AppError::Forbidden("This upload belongs to a parent not assigned to you"));
        }
        if status != UploadStatus::Pending.as_str() {
            return Err(AppError::conflict(format!("Upload has already been {status}")));
        }

        let action = VerifyAction::parse(req.action.trim())
            .ok_or_else(|| AppError::bad_request("Action must be approve or reject."))?;
        let new_status = action.resulting_status();
        let feedback = req.feedback.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let upload = sqlx::query_as::<_, Upload>(&format!(
            "UPDATE uploads
             SET status = ?, feedback = ?, verified_by = ?, verified_at = ?
             WHERE id = ? AND status = 'pending'
             RETURNING {UPLOAD_COLS}"
        ))
        .bind(new_status.as_str())
        .bind(feedback)
        .bind(staff.id)
        .bind(Utc::now())
        .bind(upload_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::conflict("Upload is no longer pending"))?;

        VERIFICATIONS_COUNTER.with_label_values(&[new_status.as_str()]).inc();
        tracing::info!(upload_id, staff_id = staff.id, status = new_status.as_str(), "upload reviewed");
        Ok(upload)
    }
}
