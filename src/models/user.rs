use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Staff,
    Parent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Parent => "parent",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "staff" => Ok(UserRole::Staff),
            "parent" => Ok(UserRole::Parent),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// Registration state of an account. Only parents ever sit in `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "approved" => Ok(AccountStatus::Approved),
            "rejected" => Ok(AccountStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown account status: {s}")),
        }
    }
}

/// DB row struct. `role` and `status` are stored as TEXT.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    /// Parent code, issued at approval.
    pub parent_id: Option<String>,
    /// Mentoring staff member (`staff.id`).
    pub staff_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Parent)
    }

    pub fn status(&self) -> AccountStatus {
        self.status.parse().unwrap_or(AccountStatus::Pending)
    }

    pub fn is_approved(&self) -> bool {
        self.status() == AccountStatus::Approved
    }
}

pub const USER_COLS: &str =
    "id, email, password_hash, name, address, phone, role, status, parent_id, staff_id, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: AccountStatus,
    pub parent_id: Option<String>,
    pub staff_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            role: u.role(),
            status: u.status(),
            id: u.id,
            email: u.email,
            name: u.name,
            address: u.address,
            phone: u.phone,
            parent_id: u.parent_id,
            staff_id: u.staff_id,
            created_at: u.created_at,
        }
    }
}

// Request/Response DTOs

/// Login form. Which identifier is read depends on `role`:
/// admins use `email`, staff use `staff_id`, parents use `parent_id`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub role: UserRole,
    pub email: Option<String>,
    pub staff_id: Option<String>,
    pub parent_id: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    /// "pending" | "approved" | "rejected" | "all" (default)
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveParentRequest {
    /// `staff.id` of the mentor to assign.
    pub staff_id: Option<i64>,
}
