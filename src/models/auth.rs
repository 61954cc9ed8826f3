use serde::{Deserialize, Serialize};

use super::user::UserRole;

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // users.id
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

/// Claims embedded in the JWT refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String, // users.id
    pub jti: String, // refresh token UUID (to enable revocation)
    pub exp: usize,
    pub iat: usize,
}

/// Caller identity decoded from the access token by the Axum extractor
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: UserRole,
}
