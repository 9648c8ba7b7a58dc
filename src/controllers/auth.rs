use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingError;
use crate::middleware::AuthUser;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(email(message = "A valid email is required"))]
    email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()
        .map_err(|e| BookingError::Validation(e.to_string()))?;

    if User::find_by_email(&req.email, &state.db.pool)
        .await?
        .is_some()
    {
        return Err(BookingError::Validation(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING id, name, email, password_hash, created_at",
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&password_hash)
    .fetch_one(&state.db.pool)
    .await?;

    let token = state.identity.issue_token(user.id)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "user": user.summary(),
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let user = User::find_by_email(&req.email, &state.db.pool)
        .await?
        .ok_or(BookingError::Unauthorized)?;

    if !user.verify_password(&req.password) {
        return Err(BookingError::Unauthorized);
    }

    let token = state.identity.issue_token(user.id)?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": user.summary(),
    })))
}

// GET /api/auth/me
async fn me(user: AuthUser) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "user": {
            "id": user.user_id,
            "name": user.name,
            "email": user.email,
        },
    }))
}
