use axum::extract::Multipart;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, AppResult},
    models::guidance::{Guidance, GuidanceCategory},
    services::storage::{self, IncomingFile, GUIDANCE_DIR},
};

const GUIDANCE_COLS: &str = "id, title, description, file_url, category, created_at, created_by";

pub struct GuidanceService;

impl GuidanceService {
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<Guidance>> {
        let items = sqlx::query_as::<_, Guidance>(&format!(
            "SELECT {GUIDANCE_COLS} FROM guidance ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    /// Multipart fields: `title` (required), `description`, `category`, `file`.
    pub async fn create(
        pool: &SqlitePool,
        upload_dir: &str,
        created_by: i64,
        mut multipart: Multipart,
    ) -> AppResult<Guidance> {
        let mut title = String::new();
        let mut description: Option<String> = None;
        let mut category: Option<GuidanceCategory> = None;
        let mut file: Option<IncomingFile> = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "title" => title = field.text().await?.trim().to_string(),
                "description" => {
                    let text = field.text().await?;
                    description = Some(text.trim().to_string()).filter(|s| !s.is_empty());
                }
                "category" => {
                    let text = field.text().await?;
                    let text = text.trim();
                    if !text.is_empty() {
                        category = Some(text.parse().map_err(|_| {
                            AppError::bad_request("Category must be guideline, faq, policy or counseling.")
                        })?);
                    }
                }
                "file" => {
                    let filename = field.file_name().unwrap_or("").to_string();
                    let bytes = field.bytes().await?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        file = Some(IncomingFile { filename, bytes });
                    }
                }
                _ => {}
            }
        }

        if title.is_empty() {
            return Err(AppError::bad_request("Title is required."));
        }

        let file_url = match &file {
            Some(f) => Some(storage::save(upload_dir, GUIDANCE_DIR, f).await?),
            None => None,
        };

        let inserted = sqlx::query_as::<_, Guidance>(&format!(
            "INSERT INTO guidance (title, description, file_url, category, created_by)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {GUIDANCE_COLS}"
        ))
        .bind(&title)
        .bind(&description)
        .bind(&file_url)
        .bind(category.map(|c| c.as_str()))
        .bind(created_by)
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(item) => {
                tracing::info!(guidance_id = item.id, "guidance published");
                Ok(item)
            }
            Err(e) => {
                if let Some(path) = &file_url {
                    storage::remove(upload_dir, path).await;
                }
                Err(e.into())
            }
        }
    }

    /// Deletes the row and its attached file, if any.
    pub async fn delete(pool: &SqlitePool, upload_dir: &str, id: i64) -> AppResult<()> {
        let file_url: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM guidance WHERE id = ? RETURNING file_url")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        let file_url = file_url.ok_or(AppError::NotFound("Guidance not found"))?;
        if let Some(path) = file_url {
            storage::remove(upload_dir, &path).await;
        }

        tracing::info!(guidance_id = id, "guidance deleted");
        Ok(())
    }
}
