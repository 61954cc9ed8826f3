use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, AppResult},
    models::{
        child::Child,
        staff::{CreateStaffRequest, Staff, DEFAULT_MAX_PARENTS, STAFF_COLS},
        upload::{Upload, UPLOAD_COLS},
        user::{User, USER_COLS},
        visit::{Visit, VISIT_COLS},
    },
};

/// Everything a mentor sees about one of their parents.
#[derive(Debug, Serialize)]
pub struct ParentDetail {
    pub parent: User,
    pub children: Vec<Child>,
    pub uploads: Vec<Upload>,
    pub visits: Vec<Visit>,
}

#[derive(Debug, Serialize)]
pub struct StaffDashboard {
    pub staff: Staff,
    pub assigned_parents: Vec<User>,
    pub pending_uploads: Vec<Upload>,
    pub upcoming_visits: Vec<Visit>,
    pub recent_visits: Vec<Visit>,
}

pub struct StaffService;

impl StaffService {
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!("SELECT {STAFF_COLS} FROM staff ORDER BY name, id"))
            .fetch_all(pool)
            .await?;
        Ok(staff)
    }

    pub async fn create(pool: &SqlitePool, bcrypt_cost: u32, req: &CreateStaffRequest) -> AppResult<Staff> {
        let name = req.name.trim();
        let email = req.email.trim();
        let code = req.staff_id.trim();
        if name.is_empty() || email.is_empty() || code.is_empty() || req.password.is_empty() {
            return Err(AppError::bad_request("Name, email, staff ID and password are required."));
        }

        let max_parents = req.max_parents.unwrap_or(DEFAULT_MAX_PARENTS);
        if max_parents < 1 {
            return Err(AppError::bad_request("max_parents must be at least 1"));
        }

        let code_taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM staff WHERE staff_id = ?)")
            .bind(code)
            .fetch_one(pool)
            .await?;
        if code_taken {
            return Err(AppError::conflict("Staff ID already exists."));
        }

        // Staff log in through a user row keyed by email, so the email must be free there too.
        let email_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM staff WHERE email = ?1)
                 OR EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        )
        .bind(email)
        .fetch_one(pool)
        .await?;
        if email_taken {
            return Err(AppError::conflict("Email already exists."));
        }

        let password_hash = bcrypt::hash(&req.password, bcrypt_cost)?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            "INSERT INTO staff (name, email, password_hash, staff_id, phone, max_parents)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {STAFF_COLS}"
        ))
        .bind(name)
        .bind(email)
        .bind(&password_hash)
        .bind(code)
        .bind(req.phone.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .bind(max_parents)
        .fetch_one(pool)
        .await?;

        tracing::info!(staff_id = staff.id, code = %staff.staff_id, "staff member created");
        Ok(staff)
    }

    /// Refused while parents are still assigned. Also removes the staff login row.
    pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        // Write first: an approval racing this delete either lands before it
        // (and blocks the delete) or finds the staff row gone.
        let removed: Option<String> = sqlx::query_scalar(
            "DELETE FROM staff
             WHERE id = ? AND NOT EXISTS (SELECT 1 FROM users WHERE staff_id = staff.id)
             RETURNING email",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(email) = removed else {
            let staff = sqlx::query_as::<_, Staff>(&format!("SELECT {STAFF_COLS} FROM staff WHERE id = ?"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound("Staff member not found"))?;
            let assigned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE staff_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(AppError::conflict(format!(
                "{} still has {assigned} assigned parent(s)",
                staff.name
            )));
        };

        sqlx::query("DELETE FROM users WHERE email = ? AND role = 'staff'")
            .bind(&email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(staff_id = id, "staff member deleted");
        Ok(())
    }

    /// Staff record behind a logged-in staff user.
    pub async fn for_user(pool: &SqlitePool, user_id: i64) -> AppResult<Staff> {
        sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff s
             JOIN users u ON u.email = s.email AND u.role = 'staff'
             WHERE u.id = ?",
            prefixed(STAFF_COLS, "s")
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Forbidden("Staff record not found"))
    }

    pub async fn assigned_parents(pool: &SqlitePool, staff_id: i64) -> AppResult<Vec<User>> {
        let parents = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users
             WHERE role = 'parent' AND staff_id = ?
             ORDER BY name, id"
        ))
        .bind(staff_id)
        .fetch_all(pool)
        .await?;
        Ok(parents)
    }

    /// Load a parent and check they are mentored by `staff_id`.
    pub async fn assigned_parent(pool: &SqlitePool, staff_id: i64, parent_id: i64) -> AppResult<User> {
        let parent = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE id = ? AND role = 'parent'"
        ))
        .bind(parent_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Parent not found"))?;

        if parent.staff_id != Some(staff_id) {
            return Err(AppError::Forbidden("This parent is not assigned to you"));
        }
        Ok(parent)
    }

    pub async fn parent_detail(pool: &SqlitePool, staff_id: i64, parent_id: i64) -> AppResult<ParentDetail> {
        let parent = Self::assigned_parent(pool, staff_id, parent_id).await?;

        let children = super::children::ChildService::list_for_parent(pool, parent.id).await?;
        let uploads = super::uploads::UploadService::list_for_parent(pool, parent.id).await?;
        let visits = super::visits::VisitService::list_for_parent(pool, parent.id).await?;

        Ok(ParentDetail { parent, children, uploads, visits })
    }

    pub async fn dashboard(pool: &SqlitePool, staff: Staff) -> AppResult<StaffDashboard> {
        let assigned_parents = Self::assigned_parents(pool, staff.id).await?;

        let pending_uploads = sqlx::query_as::<_, Upload>(&format!(
            "SELECT {} FROM uploads up
             JOIN users u ON u.id = up.parent_id
             WHERE u.staff_id = ? AND up.status = 'pending'
             ORDER BY up.upload_date DESC, up.id DESC",
            prefixed(UPLOAD_COLS, "up")
        ))
        .bind(staff.id)
        .fetch_all(pool)
        .await?;

        let upcoming_visits = super::visits::VisitService::upcoming_for_staff(pool, staff.id).await?;
        let recent_visits = super::visits::VisitService::recent_for_staff(pool, staff.id, 5).await?;

        Ok(StaffDashboard {
            staff,
            assigned_parents,
            pending_uploads,
            upcoming_visits,
            recent_visits,
        })
    }
}

/// Qualify a column list with a table alias for joined queries.
pub(crate) fn prefixed(cols: &str, alias: &str) -> String {
    cols.split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
