use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        auth::{Claims, RefreshClaims},
        staff::{Staff, STAFF_COLS},
        user::{LoginRequest, LoginResponse, RegisterRequest, User, UserProfile, UserRole, USER_COLS},
    },
    services::{
        email::EmailService,
        metrics::{LOGINS_COUNTER, PASSWORD_RESETS_COUNTER, REGISTRATIONS_COUNTER},
    },
};

const INVALID_CREDENTIALS: &str = "Invalid credentials. Please try again.";
const INVALID_STAFF_CREDENTIALS: &str = "Invalid Staff ID or password. Please try again.";
const INVALID_PARENT_CREDENTIALS: &str = "Invalid Parent ID or password. Please try again.";
const PENDING_APPROVAL: &str = "Your account is pending approval. Please wait for admin approval.";
const INVALID_REFRESH: &str = "Invalid or expired refresh token";

fn build_reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", base_url.trim_end_matches('/'))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn verify_password(password: &str, hash: &str, failure: &'static str) -> AppResult<()> {
    // A malformed stored hash counts as a mismatch, not a server fault.
    if bcrypt::verify(password, hash).unwrap_or(false) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(failure))
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub struct AuthService;

impl AuthService {
    /// Validate credentials for the requested role and open a session.
    ///
    /// Admins log in by email, staff by their staff code, parents by the
    /// parent code issued at approval. Every role also supplies a password.
    /// No attempt limit is applied.
    pub async fn login(pool: &SqlitePool, config: &Config, req: &LoginRequest) -> AppResult<LoginResponse> {
        let result = match req.role {
            UserRole::Admin => Self::authenticate_admin(pool, req).await,
            UserRole::Staff => Self::authenticate_staff(pool, req).await,
            UserRole::Parent => Self::authenticate_parent(pool, req).await,
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        LOGINS_COUNTER.with_label_values(&[req.role.as_str(), outcome]).inc();

        let user = result?;
        tracing::info!(user_id = user.id, role = %req.role, "login succeeded");
        Self::issue_tokens(pool, config, user).await
    }

    async fn authenticate_admin(pool: &SqlitePool, req: &LoginRequest) -> AppResult<User> {
        let email = non_empty(req.email.as_deref()).ok_or(AppError::Unauthorized(INVALID_CREDENTIALS))?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE email = ? AND role = 'admin'"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized(INVALID_CREDENTIALS))?;

        verify_password(&req.password, &user.password_hash, INVALID_CREDENTIALS)?;
        Ok(user)
    }

    async fn authenticate_staff(pool: &SqlitePool, req: &LoginRequest) -> AppResult<User> {
        let code = non_empty(req.staff_id.as_deref()).ok_or(AppError::Unauthorized(INVALID_STAFF_CREDENTIALS))?;

        let staff = sqlx::query_as::<_, Staff>(&format!("SELECT {STAFF_COLS} FROM staff WHERE staff_id = ?"))
            .bind(code)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::Unauthorized(INVALID_STAFF_CREDENTIALS))?;

        verify_password(&req.password, &staff.password_hash, INVALID_STAFF_CREDENTIALS)?;
        Self::materialize_staff_user(pool, &staff).await
    }

    async fn authenticate_parent(pool: &SqlitePool, req: &LoginRequest) -> AppResult<User> {
        let code = non_empty(req.parent_id.as_deref()).ok_or(AppError::Unauthorized(INVALID_PARENT_CREDENTIALS))?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE parent_id = ? AND role = 'parent'"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized(INVALID_PARENT_CREDENTIALS))?;

        verify_password(&req.password, &user.password_hash, INVALID_PARENT_CREDENTIALS)?;
        if !user.is_approved() {
            return Err(AppError::Forbidden(PENDING_APPROVAL));
        }
        Ok(user)
    }

    /// Return the session user backing a staff record, creating it on first use.
    /// The staff password hash is copied as-is.
    pub async fn materialize_staff_user(pool: &SqlitePool, staff: &Staff) -> AppResult<User> {
        let select = format!("SELECT {USER_COLS} FROM users WHERE email = ? AND role = 'staff'");

        if let Some(user) = sqlx::query_as::<_, User>(&select)
            .bind(&staff.email)
            .fetch_optional(pool)
            .await?
        {
            return Ok(user);
        }

        // Concurrent first logins race on the unique email; the loser reads the winner's row.
        sqlx::query(
            "INSERT INTO users (email, password_hash, name, phone, role, status)
             VALUES (?, ?, ?, ?, 'staff', 'approved')
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(&staff.email)
        .bind(&staff.password_hash)
        .bind(&staff.name)
        .bind(&staff.phone)
        .execute(pool)
        .await?;

        let user = sqlx::query_as::<_, User>(&select)
            .bind(&staff.email)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::conflict("Staff email is already used by another account"))?;

        tracing::info!(user_id = user.id, staff_code = %staff.staff_id, "materialized staff login");
        Ok(user)
    }

    /// Create a parent account awaiting admin approval.
    pub async fn register(pool: &SqlitePool, bcrypt_cost: u32, req: &RegisterRequest) -> AppResult<UserProfile> {
        let result = Self::register_inner(pool, bcrypt_cost, req).await;
        let outcome = if result.is_ok() { "created" } else { "refused" };
        REGISTRATIONS_COUNTER.with_label_values(&[outcome]).inc();
        result
    }

    async fn register_inner(pool: &SqlitePool, bcrypt_cost: u32, req: &RegisterRequest) -> AppResult<UserProfile> {
        if req.password != req.confirm_password {
            return Err(AppError::bad_request("Passwords do not match."));
        }

        let name = req.name.trim();
        let email = req.email.trim();
        if name.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err(AppError::bad_request("Name, email and password are required."));
        }
        if !email.contains('@') {
            return Err(AppError::bad_request("Invalid email address."));
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)
                 OR EXISTS(SELECT 1 FROM staff WHERE email = ?1)",
        )
        .bind(email)
        .fetch_one(pool)
        .await?;
        if taken {
            return Err(AppError::conflict("Email already registered."));
        }

        let password_hash = bcrypt::hash(&req.password, bcrypt_cost)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, address, phone, role, status)
             VALUES (?, ?, ?, ?, ?, 'parent', 'pending')
             RETURNING {USER_COLS}"
        ))
        .bind(email)
        .bind(&password_hash)
        .bind(name)
        .bind(non_empty(req.address.as_deref()))
        .bind(non_empty(req.phone.as_deref()))
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = user.id, "parent registered, awaiting approval");
        Ok(user.into())
    }

    pub async fn find_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("User not found"))
    }

    /// Create the bootstrap administrator unless the email is already taken.
    /// Returns whether an account was created. A staff member's email is refused.
    pub async fn ensure_admin(
        pool: &SqlitePool,
        name: &str,
        email: &str,
        password: &str,
        bcrypt_cost: u32,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(pool)
            .await?;
        if exists {
            return Ok(false);
        }

        // The staff login row is created on first login and keyed by email.
        let staff_email: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM staff WHERE email = ?)")
            .bind(email)
            .fetch_one(pool)
            .await?;
        if staff_email {
            return Err(AppError::conflict(format!("{email} belongs to a staff member")));
        }

        let password_hash = bcrypt::hash(password, bcrypt_cost)?;
        sqlx::query(
            "INSERT INTO users (email, password_hash, name, role, status)
             VALUES (?, ?, ?, 'admin', 'approved')",
        )
        .bind(email)
        .bind(&password_hash)
        .bind(name)
        .execute(pool)
        .await?;

        tracing::info!("created admin account {email}");
        Ok(true)
    }

    async fn issue_tokens(pool: &SqlitePool, config: &Config, user: User) -> AppResult<LoginResponse> {
        let access_token = Self::generate_access_token(&user, &config.jwt_secret, config.jwt_expiry_seconds)?;
        let (refresh_token, refresh_id) =
            Self::generate_refresh_token(user.id, &config.jwt_refresh_secret, config.jwt_refresh_expiry_days)?;

        let hash = bcrypt::hash(&refresh_token, config.bcrypt_cost)?;
        let expires_at = Utc::now() + chrono::Duration::days(config.jwt_refresh_expiry_days as i64);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(refresh_id.to_string())
        .bind(user.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    pub fn generate_access_token(user: &User, secret: &str, ttl_seconds: u64) -> AppResult<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(user_id: i64, secret: &str, ttl_days: u64) -> AppResult<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    fn decode_refresh_token(token: &str, secret: &str, validate_exp: bool) -> AppResult<RefreshClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = validate_exp;
        decode::<RefreshClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized(INVALID_REFRESH))
    }

    /// Rotate refresh token: revoke old, issue new pair.
    pub async fn refresh(pool: &SqlitePool, config: &Config, token: &str) -> AppResult<LoginResponse> {
        let claims = Self::decode_refresh_token(token, &config.jwt_refresh_secret, true)?;

        let row: Option<(i64, String, chrono::DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, token_hash, expires_at FROM refresh_tokens
             WHERE id = ? AND revoked = FALSE",
        )
        .bind(&claims.jti)
        .fetch_optional(pool)
        .await?;

        let (user_id, token_hash, expires_at) = row.ok_or(AppError::Unauthorized(INVALID_REFRESH))?;
        if expires_at <= Utc::now() {
            return Err(AppError::Unauthorized(INVALID_REFRESH));
        }
        verify_password(token, &token_hash, INVALID_REFRESH)?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
            .bind(&claims.jti)
            .execute(pool)
            .await?;

        let user = Self::find_user(pool, user_id).await?;
        Self::issue_tokens(pool, config, user).await
    }

    /// Revoke the session's refresh token. Expired tokens may still be revoked.
    pub async fn logout(pool: &SqlitePool, config: &Config, token: &str) -> AppResult<()> {
        let claims = Self::decode_refresh_token(token, &config.jwt_refresh_secret, false)?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
            .bind(&claims.jti)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Store a reset token and mail it when SMTP is configured.
    /// Always returns Ok for unknown emails to avoid leaking account existence.
    pub async fn request_password_reset(
        pool: &SqlitePool,
        email_svc: Option<&EmailService>,
        base_url: &str,
        email: &str,
    ) -> AppResult<()> {
        let email = email.trim();

        let mut user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(pool)
            .await?;

        // Staff who never logged in only exist in the staff table.
        if user.is_none() {
            let staff = sqlx::query_as::<_, Staff>(&format!("SELECT {STAFF_COLS} FROM staff WHERE email = ?"))
                .bind(email)
                .fetch_optional(pool)
                .await?;
            if let Some(staff) = staff {
                user = Some(Self::materialize_staff_user(pool, &staff).await?);
            }
        }

        let Some(user) = user else {
            return Ok(());
        };

        let token = random_token(48);
        let expires_at = Utc::now() + chrono::Duration::hours(1);

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token, expires_at)
             VALUES (?, ?, ?)",
        )
        .bind(user.id)
        .bind(&token)
        .bind(expires_at)
        .execute(pool)
        .await?;

        PASSWORD_RESETS_COUNTER.with_label_values(&["requested"]).inc();

        if let Some(svc) = email_svc {
            let reset_url = build_reset_url(base_url, &token);
            // Send failures are logged, the request still succeeds
            if let Err(e) = svc.send_password_reset(&user.email, &user.name, &reset_url).await {
                tracing::warn!(user_id = user.id, "password reset email not sent: {e}");
            }
        }

        Ok(())
    }

    /// Claim the token, store the new password hash and revoke all refresh tokens.
    /// Staff accounts keep their staff record in sync so the staff-code login keeps working.
    pub async fn reset_password(
        pool: &SqlitePool,
        bcrypt_cost: u32,
        token: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if new_password.is_empty() {
            return Err(AppError::bad_request("Password is required."));
        }

        let password_hash = bcrypt::hash(new_password, bcrypt_cost)?;
        let mut tx = pool.begin().await?;

        // Claiming the token is the first write, so a concurrent reset with the
        // same token waits for this transaction and then finds it used.
        let claimed: Option<(i64, chrono::DateTime<Utc>)> = sqlx::query_as(
            "UPDATE password_reset_tokens SET used = TRUE
             WHERE token = ? AND used = FALSE
             RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let user_id = match claimed {
            Some((user_id, expires_at)) if expires_at > Utc::now() => user_id,
            _ => return Err(AppError::bad_request("Invalid or expired token")),
        };

        let (email, role): (String, String) =
            sqlx::query_as("UPDATE users SET password_hash = ? WHERE id = ? RETURNING email, role")
                .bind(&password_hash)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        if role == UserRole::Staff.as_str() {
            sqlx::query("UPDATE staff SET password_hash = ? WHERE email = ?")
                .bind(&password_hash)
                .bind(&email)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        PASSWORD_RESETS_COUNTER.with_label_values(&["completed"]).inc();
        tracing::info!(user_id, "password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_url_joins_base_without_double_slash() {
        assert_eq!(
            build_reset_url("http://localhost:8080/", "abc"),
            "http://localhost:8080/reset-password?token=abc"
        );
    }

    #[test]
    fn random_tokens_are_alphanumeric_and_distinct() {
        let a = random_token(48);
        let b = random_token(48);
        assert_eq!(a.len(), 48);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(matches!(
            verify_password("pw", "not-a-hash", INVALID_CREDENTIALS),
            Err(AppError::Unauthorized(_))
        ));
    }
}
