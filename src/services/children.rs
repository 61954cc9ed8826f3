use sqlx::SqlitePool;

use crate::{
    error::{AppError, AppResult},
    models::child::{Child, ChildWithParent, CreateChildRequest},
};

const CHILD_COLS: &str = "id, parent_id, name, dob, gender, adoption_date, background_info, created_at";

pub struct ChildService;

impl ChildService {
    pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<ChildWithParent>> {
        let children = sqlx::query_as::<_, ChildWithParent>(
            "SELECT c.id, c.parent_id, u.name AS parent_name, u.parent_id AS parent_code,
                    c.name, c.dob, c.gender, c.adoption_date, c.background_info, c.created_at
             FROM children c
             JOIN users u ON u.id = c.parent_id
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .fetch_all(pool)
        .await?;
        Ok(children)
    }

    pub async fn list_for_parent(pool: &SqlitePool, parent_id: i64) -> AppResult<Vec<Child>> {
        let children = sqlx::query_as::<_, Child>(&format!(
            "SELECT {CHILD_COLS} FROM children WHERE parent_id = ? ORDER BY name, id"
        ))
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(children)
    }

    pub async fn find_for_parent(pool: &SqlitePool, parent_id: i64, child_id: i64) -> AppResult<Child> {
        sqlx::query_as::<_, Child>(&format!(
            "SELECT {CHILD_COLS} FROM children WHERE id = ? AND parent_id = ?"
        ))
        .bind(child_id)
        .bind(parent_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Child not found"))
    }

    /// The referenced user must be a parent account.
    pub async fn create(pool: &SqlitePool, req: &CreateChildRequest) -> AppResult<Child> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("Child name is required."));
        }

        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
            .bind(req.parent_id)
            .fetch_optional(pool)
            .await?;
        match role.as_deref() {
            None => return Err(AppError::NotFound("Parent not found")),
            Some("parent") => {}
            Some(_) => return Err(AppError::bad_request("Children can only be added to parent accounts")),
        }

        let child = sqlx::query_as::<_, Child>(&format!(
            "INSERT INTO children (parent_id, name, dob, gender, adoption_date, background_info)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {CHILD_COLS}"
        ))
        .bind(req.parent_id)
        .bind(name)
        .bind(req.dob)
        .bind(&req.gender)
        .bind(req.adoption_date)
        .bind(&req.background_info)
        .fetch_one(pool)
        .await?;

        tracing::info!(child_id = child.id, parent_id = child.parent_id, "child record created");
        Ok(child)
    }
}
