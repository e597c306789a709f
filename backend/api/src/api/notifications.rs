//! Per-user notification feed.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::auth::AuthUser;
use crate::db;
use crate::errors::{ApiError, Result};

use super::AppState;

/// `GET /api/v1/notifications`
pub async fn mine(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let notifications = db::notifications_for_user(&state.pool, &user.uid).await?;
    Ok(Json(notifications))
}

/// `PUT /api/v1/notifications/:id/read`
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let updated = db::mark_notification_read(&state.pool, id, &user.uid).await?;
    if updated == 0 {
        // Zero rows: either the id is unknown or the row is someone else's.
        return match db::get_notification(&state.pool, id).await? {
            Some(_) => Err(ApiError::Forbidden("Not your notification.".to_string())),
            None => Err(ApiError::NotFound("Notification not found.".to_string())),
        };
    }
    Ok(StatusCode::NO_CONTENT)
}
