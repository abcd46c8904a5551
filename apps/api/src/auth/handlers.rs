//! Axum route handlers for the authentication API.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{issue_access_token, issue_token_pair, verify_refresh_token, TokenPair};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub name: String,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/users/register/
///
/// Creates an account and returns a token pair so the client is signed in
/// immediately after registration.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let username = request.username.trim().to_string();

    if username.is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("password cannot be empty".to_string()));
    }
    if request.password != request.confirm_password {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&state.db)
        .await?;

    if existing > 0 {
        return Err(AppError::Validation(format!(
            "username '{username}' is already taken"
        )));
    }

    let user_id = Uuid::new_v4();
    let display_name = if request.name.trim().is_empty() {
        username.clone()
    } else {
        request.name.trim().to_string()
    };

    sqlx::query(
        "INSERT INTO users (id, username, display_name, password_hash, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(&username)
    .bind(&display_name)
    .bind(hash_password(&request.password)?)
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    let tokens = issue_token_pair(&state.config.jwt_secret, user_id, &username)?;

    tracing::info!("Registered user '{username}' ({user_id})");

    Ok(Json(RegisterResponse {
        username,
        name: display_name,
        tokens,
    }))
}

/// POST /api/token/
///
/// Credential login. Returns `{access, refresh}` on success. Unknown users
/// and wrong passwords are indistinguishable to the caller.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(request.username.trim())
        .fetch_optional(&state.db)
        .await?;

    let user = match user {
        Some(u) if verify_password(&request.password, &u.password_hash) => u,
        _ => return Err(AppError::Unauthorized),
    };

    let tokens = issue_token_pair(&state.config.jwt_secret, user.id, &user.username)?;

    Ok(Json(tokens))
}

/// POST /api/token/refresh/
///
/// Exchanges a refresh token for a new access token.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let claims = verify_refresh_token(&state.config.jwt_secret, &request.refresh)?;

    let access = issue_access_token(&state.config.jwt_secret, claims.sub, &claims.username)?;

    Ok(Json(RefreshResponse { access }))
}
