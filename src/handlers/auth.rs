use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::User;
use crate::services::auth;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub user: User,
    pub redirect: &'static str,
}

impl From<User> for SignedIn {
    fn from(user: User) -> Self {
        let redirect = auth::landing_route(&user.role);
        Self { user, redirect }
    }
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SignedIn>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }
    let user = auth::login(&state, req.email.trim(), &req.password).await?;
    Ok(Json(user.into()))
}

// POST /api/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    auth::logout(&state)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/auth/me
pub async fn me(State(state): State<Arc<AppState>>) -> Result<Json<SignedIn>, AppError> {
    let user = auth::current_user(&state).ok_or(AppError::Unauthorized)?;
    Ok(Json(user.into()))
}
