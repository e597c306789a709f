//! Registration and profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::auth::AuthUser;
use crate::db;
use crate::errors::{ApiError, Result};
use crate::models::{UserPublic, UserRole};

use super::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
}

#[derive(Deserialize)]
pub struct PushTokenUpdate {
    pub push_token: String,
}

/// `POST /api/v1/auth/register`
///
/// Creates the account at the identity provider, geocodes the address, and
/// inserts the profile row with `Pending` verification.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    if req.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters.".to_string(),
        ));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name must not be empty.".to_string()));
    }

    let uid = state.identity.sign_up(&req.email, &req.password).await?;

    // A profile with no coordinates is still usable; it just never appears
    // in distance-sorted feeds or notification fan-out.
    let coordinates = match state.geo.geocode(&req.address).await {
        Ok(coords) => coords,
        Err(e) => {
            warn!("Geocoding during registration failed for {uid}: {e}");
            None
        }
    };

    let new_user = db::NewUser {
        uid: &uid,
        email: &req.email,
        role: req.role,
        name: &req.name,
        address: &req.address,
        phone_number: req.phone_number.as_deref(),
        coordinates,
        bank_name: req.bank_name.as_deref(),
        bank_account: req.bank_account.as_deref(),
        created_at: Utc::now().timestamp(),
    };
    db::insert_user(&state.pool, &new_user).await?;

    let user = db::get_user(&state.pool, &uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found after creation.".to_string()))?;

    Ok((StatusCode::CREATED, Json(UserPublic::from(&user))))
}

/// `GET /api/v1/auth/me`
pub async fn me(AuthUser(user): AuthUser) -> Result<impl IntoResponse> {
    Ok(Json(UserPublic::from(&user)))
}

/// `POST /api/v1/auth/me/push-token`
pub async fn update_push_token(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<PushTokenUpdate>,
) -> Result<impl IntoResponse> {
    db::update_push_token(&state.pool, &user.uid, &req.push_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
