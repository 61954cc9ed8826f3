use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        user::{
            ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
            ResetPasswordRequest, UserProfile,
        },
    },
    routes::ApiError,
    services::auth::AuthService,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = AuthService::login(&state.db, &state.config, &body).await?;
    Ok(Json(json!(response)))
}

/// Parent self-registration. The account stays pending until an admin approves it.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = AuthService::register(&state.db, state.config.bcrypt_cost, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful! Please wait for admin approval.",
            "user": user,
        })),
    ))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = AuthService::refresh(&state.db, &state.config, &body.refresh_token).await?;
    Ok(Json(json!(response)))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::logout(&state.db, &state.config, &body.refresh_token).await?;
    Ok(Json(json!({ "message": "You have been logged out." })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let user = AuthService::find_user(&state.db, user.user_id).await?;
    Ok(Json(json!(UserProfile::from(user))))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::request_password_reset(
        &state.db,
        state.email.as_deref(),
        &state.config.app_base_url,
        &body.email,
    )
    .await?;

    // Same answer whether or not the account exists.
    Ok(Json(json!({
        "message": "If an account exists for this email, a reset link has been sent."
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    AuthService::reset_password(&state.db, state.config.bcrypt_cost, &body.token, &body.new_password).await?;
    Ok(Json(json!({ "message": "Your password has been reset. Please log in." })))
}
