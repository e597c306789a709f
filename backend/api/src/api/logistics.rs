//! Delivery handlers for Logistics drivers — claiming reserved deliveries
//! and advancing them to In Transit / Delivered.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{require_role, VerifiedUser};
use crate::db;
use crate::errors::{ApiError, Result};
use crate::models::{DeliveryMethod, PostStatus, UserRole};
use crate::push;

use super::posts::{cached_user, PostView};
use super::AppState;

const DRIVERS_ONLY: &str = "Access restricted to Logistics users.";

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: PostStatus,
}

/// `GET /api/v1/logistics/available`
///
/// Reserved delivery posts that no driver has claimed yet.
pub async fn available(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
) -> Result<impl IntoResponse> {
    require_role(&user, UserRole::Logistics, DRIVERS_ONLY)?;

    let posts = db::unassigned_deliveries(&state.pool).await?;

    let mut cache = HashMap::new();
    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let donor_details = cached_user(&state, &mut cache, &post.donor_uid).await?;
        views.push(PostView {
            post,
            donor_details,
            distance_km: None,
        });
    }
    Ok(Json(views))
}

/// `POST /api/v1/logistics/:id/accept`
///
/// Claim a delivery. Assignment is a conditional UPDATE on
/// `logistics_uid IS NULL`, so only one driver can ever win.
pub async fn accept(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    require_role(&user, UserRole::Logistics, DRIVERS_ONLY)?;

    let assigned = db::assign_driver(&state.pool, id, &user.uid).await?;
    if assigned == 0 {
        let post = db::get_post(&state.pool, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;

        if post.logistics_uid.is_some() {
            return Err(ApiError::BadRequest(
                "This delivery has already been accepted by another driver.".to_string(),
            ));
        }
        if post.delivery_method == DeliveryMethod::Pickup {
            return Err(ApiError::BadRequest(
                "This post is set for Pickup, not Delivery.".to_string(),
            ));
        }
        return Err(ApiError::BadRequest(
            "This post is not reserved for delivery.".to_string(),
        ));
    }

    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;

    if let Some(receiver_uid) = &post.receiver_uid {
        if let Some(receiver) = db::get_user(&state.pool, receiver_uid).await? {
            push::notify(
                &state.pool,
                &state.push,
                &receiver,
                "Driver Assigned",
                &format!("A driver ({}) has accepted your delivery.", user.name),
            )
            .await;
        }
    }

    let mut cache = HashMap::new();
    let donor_details = cached_user(&state, &mut cache, &post.donor_uid).await?;
    Ok(Json(PostView {
        post,
        donor_details,
        distance_km: None,
    }))
}

/// `PUT /api/v1/logistics/:id/status`
///
/// The assigned driver advances a shipment to `In Transit` or `Delivered`.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<impl IntoResponse> {
    require_role(&user, UserRole::Logistics, DRIVERS_ONLY)?;

    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;
    if post.logistics_uid.as_deref() != Some(user.uid.as_str()) {
        return Err(ApiError::Forbidden(
            "You are not the assigned driver for this shipment.".to_string(),
        ));
    }

    let now = Utc::now().timestamp();
    let (advanced, title, body) = match update.status {
        PostStatus::InTransit => (
            db::mark_in_transit(&state.pool, id, &user.uid, now).await?,
            "Food on the way",
            "The driver has picked up the food.",
        ),
        PostStatus::Delivered => (
            db::mark_delivered(&state.pool, id, &user.uid, now).await?,
            "Food Delivered",
            "Your food donation has arrived!",
        ),
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid status update for driver.".to_string(),
            ))
        }
    };

    if advanced == 0 {
        return Err(ApiError::BadRequest(format!(
            "Cannot move this shipment to '{:?}' from its current state.",
            update.status
        )));
    }

    if let Some(receiver_uid) = &post.receiver_uid {
        if let Some(receiver) = db::get_user(&state.pool, receiver_uid).await? {
            push::notify(&state.pool, &state.push, &receiver, title, body).await;
        }
    }

    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found.".to_string()))?;

    let mut cache = HashMap::new();
    let donor_details = cached_user(&state, &mut cache, &post.donor_uid).await?;
    Ok(Json(PostView {
        post,
        donor_details,
        distance_km: None,
    }))
}
