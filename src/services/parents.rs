use rand::{rngs::StdRng, Rng, SeedableRng};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        staff::{Staff, STAFF_COLS},
        user::{AccountStatus, UpdateProfileRequest, User, UserRole, USER_COLS},
    },
    services::metrics::PARENT_DECISIONS_COUNTER,
};

const CODE_ATTEMPTS: usize = 20;

/// `PAR` followed by six random digits.
pub fn generate_parent_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("PAR{:06}", rng.gen_range(0..1_000_000))
}

/// Parse a `?status=` filter; `None` and `"all"` mean no filter.
pub fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<AccountStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Unknown status filter: {s}"))),
    }
}

pub struct ParentService;

impl ParentService {
    pub async fn list(pool: &SqlitePool, status: Option<AccountStatus>) -> AppResult<Vec<User>> {
        let parents = match status {
            Some(status) => {
                sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLS} FROM users
                     WHERE role = 'parent' AND status = ?
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(status.as_str())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLS} FROM users
                     WHERE role = 'parent'
                     ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(pool)
                .await?
            }
        };
        Ok(parents)
    }

    pub async fn recent(pool: &SqlitePool, limit: i64) -> AppResult<Vec<User>> {
        let parents = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users
             WHERE role = 'parent'
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(parents)
    }

    /// Approve a pending parent, issue their parent code and assign a mentor.
    ///
    /// The transaction opens with the conditional counter update, so concurrent
    /// approvals queue on the write lock and never exceed `max_parents`.
    pub async fn approve(pool: &SqlitePool, parent_id: i64, staff_id: Option<i64>) -> AppResult<User> {
        Self::approve_with(pool, parent_id, staff_id, &mut StdRng::from_entropy()).await
    }

    async fn approve_with<R: Rng + Send>(
        pool: &SqlitePool,
        parent_id: i64,
        staff_id: Option<i64>,
        rng: &mut R,
    ) -> AppResult<User> {
        let parent = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE id = ?"))
            .bind(parent_id)
            .fetch_optional(pool)
            .await?
            .filter(|u| u.role() == UserRole::Parent)
            .ok_or(AppError::NotFound("Parent not found"))?;

        if parent.status() != AccountStatus::Pending {
            return Err(AppError::conflict(format!("Parent is already {}", parent.status())));
        }

        let staff_id = staff_id.ok_or_else(|| AppError::bad_request("Please select a staff member to assign."))?;

        let staff = sqlx::query_as::<_, Staff>(&format!("SELECT {STAFF_COLS} FROM staff WHERE id = ?"))
            .bind(staff_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid staff member"))?;

        if !staff.has_capacity() {
            return Err(capacity_reached(&staff));
        }

        let mut tx = pool.begin().await?;

        let bumped = sqlx::query(
            "UPDATE staff SET assigned_parent_count = assigned_parent_count + 1
             WHERE id = ? AND assigned_parent_count < max_parents",
        )
        .bind(staff.id)
        .execute(&mut *tx)
        .await?;
        if bumped.rows_affected() == 0 {
            let still_there: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM staff WHERE id = ?)")
                .bind(staff.id)
                .fetch_one(&mut *tx)
                .await?;
            if !still_there {
                return Err(AppError::bad_request("Invalid staff member"));
            }
            return Err(capacity_reached(&staff));
        }

        let code = Self::free_parent_code(&mut tx, rng).await?;

        let approved = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET status = 'approved', parent_id = ?, staff_id = ?
             WHERE id = ? AND status = 'pending'
             RETURNING {USER_COLS}"
        ))
        .bind(&code)
        .bind(staff.id)
        .bind(parent.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::conflict("Parent is no longer pending"))?;

        tx.commit().await?;

        PARENT_DECISIONS_COUNTER.with_label_values(&["approved"]).inc();
        tracing::info!(parent_id = approved.id, staff_id = staff.id, code = %code, "parent approved");
        Ok(approved)
    }

    /// Draw codes until one is not held by any user.
    async fn free_parent_code<R: Rng + Send>(
        tx: &mut Transaction<'_, Sqlite>,
        rng: &mut R,
    ) -> AppResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let candidate = generate_parent_code(rng);
            let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE parent_id = ?)")
                .bind(&candidate)
                .fetch_one(&mut **tx)
                .await?;
            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(code = %candidate, "parent code taken, drawing again");
        }
        Err(anyhow::anyhow!("could not generate a free parent code").into())
    }

    /// pending → rejected. No code is issued.
    pub async fn reject(pool: &SqlitePool, parent_id: i64) -> AppResult<User> {
        let rejected = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET status = 'rejected'
             WHERE id = ? AND role = 'parent' AND status = 'pending'
             RETURNING {USER_COLS}"
        ))
        .bind(parent_id)
        .fetch_optional(pool)
        .await?;

        if let Some(user) = rejected {
            PARENT_DECISIONS_COUNTER.with_label_values(&["rejected"]).inc();
            tracing::info!(parent_id = user.id, "parent rejected");
            return Ok(user);
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM users WHERE id = ? AND role = 'parent'")
                .bind(parent_id)
                .fetch_optional(pool)
                .await?;
        match current {
            None => Err(AppError::NotFound("Parent not found")),
            Some(status) => Err(AppError::conflict(format!("Parent is already {status}"))),
        }
    }

    /// Load the caller as an approved parent.
    pub async fn require_approved(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE id = ? AND role = 'parent'"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Parent not found"))?;

        if !user.is_approved() {
            return Err(AppError::Forbidden("Your account is pending approval."));
        }
        Ok(user)
    }

    /// Blank fields are left unchanged.
    pub async fn update_profile(pool: &SqlitePool, user_id: i64, req: &UpdateProfileRequest) -> AppResult<User> {
        let clean = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET name    = COALESCE(?, name),
                 address = COALESCE(?, address),
                 phone   = COALESCE(?, phone)
             WHERE id = ?
             RETURNING {USER_COLS}"
        ))
        .bind(clean(&req.name))
        .bind(clean(&req.address))
        .bind(clean(&req.phone))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;
        Ok(user)
    }
}

fn capacity_reached(staff: &Staff) -> AppError {
    AppError::conflict(format!(
        "{} has reached the maximum number of assigned parents ({})",
        staff.name, staff.max_parents
    ))
}
