use axum::extract::Multipart;
use chrono::Utc;
use sqlx::{types::Json, SqlitePool};

use crate::{
    error::{AppError, AppResult},
    models::{
        staff::Staff,
        visit::{CreateVisitRequest, Visit, VisitStatus, VISIT_COLS},
    },
    services::{
        metrics::VISITS_COUNTER,
        staff::StaffService,
        storage::{self, IncomingFile, VISITS_DIR},
    },
};

/// `None` and `"all"` mean no filter.
pub fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<VisitStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Unknown status filter: {s}"))),
    }
}

pub struct VisitService;

impl VisitService {
    /// Schedule a home visit for a parent mentored by `staff`.
    pub async fn create(pool: &SqlitePool, staff: &Staff, req: &CreateVisitRequest) -> AppResult<Visit> {
        let parent = StaffService::assigned_parent(pool, staff.id, req.parent_id).await?;
        let remarks = req.remarks.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let visit = sqlx::query_as::<_, Visit>(&format!(
            "INSERT INTO visits (parent_id, staff_id, visit_date, scheduled_date, remarks, status)
             VALUES (?, ?, ?, ?, ?, 'scheduled')
             RETURNING {VISIT_COLS}"
        ))
        .bind(parent.id)
        .bind(staff.id)
        .bind(req.visit_date)
        .bind(Utc::now().date_naive())
        .bind(remarks)
        .fetch_one(pool)
        .await?;

        VISITS_COUNTER.with_label_values(&["scheduled"]).inc();
        tracing::info!(visit_id = visit.id, parent_id = parent.id, staff_id = staff.id, "visit scheduled");
        Ok(visit)
    }

    async fn find_owned(pool: &SqlitePool, staff: &Staff, visit_id: i64) -> AppResult<Visit> {
        let visit = sqlx::query_as::<_, Visit>(&format!("SELECT {VISIT_COLS} FROM visits WHERE id = ?"))
            .bind(visit_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Visit not found"))?;

        if visit.staff_id != staff.id {
            return Err(AppError::Forbidden("You are not authorized to update this visit"));
        }
        if visit.status() != VisitStatus::Scheduled {
            return Err(AppError::conflict(format!("Visit is already {}", visit.status)));
        }
        Ok(visit)
    }

    /// scheduled → completed. Multipart fields: `remarks` (optional) and any number of `photos`.
    /// Blank remarks keep the ones entered when scheduling.
    pub async fn complete(
        pool: &SqlitePool,
        upload_dir: &str,
        staff: &Staff,
        visit_id: i64,
        mut multipart: Multipart,
    ) -> AppResult<Visit> {
        Self::find_owned(pool, staff, visit_id).await?;

        let mut remarks: Option<String> = None;
        let mut photos: Vec<IncomingFile> = Vec::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "remarks" => {
                    let text = field.text().await?;
                    let text = text.trim();
                    if !text.is_empty() {
                        remarks = Some(text.to_string());
                    }
                }
                "photos" => {
                    let filename = field.file_name().unwrap_or("").to_string();
                    let bytes = field.bytes().await?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        photos.push(IncomingFile { filename, bytes });
                    }
                }
                _ => {}
            }
        }

        let mut stored = Vec::with_capacity(photos.len());
        for photo in &photos {
            match storage::save(upload_dir, VISITS_DIR, photo).await {
                Ok(path) => stored.push(path),
                Err(e) => {
                    discard(upload_dir, &stored).await;
                    return Err(e);
                }
            }
        }

        let photos_json = (!stored.is_empty()).then(|| Json(stored.clone()));

        let updated = sqlx::query_as::<_, Visit>(&format!(
            "UPDATE visits
             SET status  = 'completed',
                 remarks = COALESCE(?, remarks),
                 photos  = COALESCE(?, photos)
             WHERE id = ? AND status = 'scheduled'
             RETURNING {VISIT_COLS}"
        ))
        .bind(remarks)
        .bind(photos_json)
        .bind(visit_id)
        .fetch_optional(pool)
        .await;

        let visit = match updated {
            Ok(Some(visit)) => visit,
            Ok(None) => {
                discard(upload_dir, &stored).await;
                return Err(AppError::conflict("Visit is no longer scheduled"));
            }
            Err(e) => {
                discard(upload_dir, &stored).await;
                return Err(e.into());
            }
        };

        VISITS_COUNTER.with_label_values(&["completed"]).inc();
        tracing::info!(visit_id, staff_id = staff.id, photos = stored.len(), "visit completed");
        Ok(visit)
    }

    /// scheduled → cancelled.
    pub async fn cancel(pool: &SqlitePool, staff: &Staff, visit_id: i64) -> AppResult<Visit> {
        Self::find_owned(pool, staff, visit_id).await?;

        let visit = sqlx::query_as::<_, Visit>(&format!(
            "UPDATE visits SET status = 'cancelled'
             WHERE id = ? AND status = 'scheduled'
             RETURNING {VISIT_COLS}"
        ))
        .bind(visit_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::conflict("Visit is no longer scheduled"))?;

        VISITS_COUNTER.with_label_values(&["cancelled"]).inc();
        tracing::info!(visit_id, staff_id = staff.id, "visit cancelled");
        Ok(visit)
    }

    pub async fn list_for_staff(
        pool: &SqlitePool,
        staff_id: i64,
        status: Option<VisitStatus>,
    ) -> AppResult<Vec<Visit>> {
        let visits = match status {
            Some(status) => {
                sqlx::query_as::<_, Visit>(&format!(
                    "SELECT {VISIT_COLS} FROM visits
                     WHERE staff_id = ? AND status = ?
                     ORDER BY visit_date DESC, id DESC"
                ))
                .bind(staff_id)
                .bind(status.as_str())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Visit>(&format!(
                    "SELECT {VISIT_COLS} FROM visits
                     WHERE staff_id = ?
                     ORDER BY visit_date DESC, id DESC"
                ))
                .bind(staff_id)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(visits)
    }

    pub async fn list_for_parent(pool: &SqlitePool, parent_id: i64) -> AppResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLS} FROM visits
             WHERE parent_id = ?
             ORDER BY visit_date DESC, id DESC"
        ))
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(visits)
    }

    /// Scheduled visits dated today or later.
    pub async fn upcoming_for_staff(pool: &SqlitePool, staff_id: i64) -> AppResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLS} FROM visits
             WHERE staff_id = ? AND status = 'scheduled' AND visit_date >= ?
             ORDER BY visit_date, id"
        ))
        .bind(staff_id)
        .bind(Utc::now().date_naive())
        .fetch_all(pool)
        .await?;
        Ok(visits)
    }

    pub async fn upcoming_for_parent(pool: &SqlitePool, parent_id: i64) -> AppResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLS} FROM visits
             WHERE parent_id = ? AND status = 'scheduled' AND visit_date >= ?
             ORDER BY visit_date, id"
        ))
        .bind(parent_id)
        .bind(Utc::now().date_naive())
        .fetch_all(pool)
        .await?;
        Ok(visits)
    }

    pub async fn recent_for_staff(pool: &SqlitePool, staff_id: i64, limit: i64) -> AppResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            "SELECT {VISIT_COLS} FROM visits
             WHERE staff_id = ?
             ORDER BY visit_date DESC, id DESC
             LIMIT ?"
        ))
        .bind(staff_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(visits)
    }
}

async fn discard(upload_dir: &str, paths: &[String]) {
    for path in paths {
        storage::remove(upload_dir, path).await;
    }
}
