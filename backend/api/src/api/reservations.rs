//! Reservation listing for donors and receivers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::auth::VerifiedUser;
use crate::db;
use crate::errors::Result;
use crate::models::{Reservation, UserPublic, UserRole};

use super::posts::{cached_user, PostView};
use super::AppState;

#[derive(Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub post_details: Option<PostView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_details: Option<UserPublic>,
}

/// `GET /api/v1/reservations/me`
///
/// Receivers see their own reservations; donors see reservations against
/// their posts (with receiver details); everyone else gets an empty list.
pub async fn mine(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
) -> Result<impl IntoResponse> {
    let reservations = match user.role {
        UserRole::Receiver => db::reservations_for_receiver(&state.pool, &user.uid).await?,
        UserRole::Donor => db::reservations_for_donor(&state.pool, &user.uid).await?,
        _ => Vec::new(),
    };

    let mut user_cache = HashMap::new();
    let mut views = Vec::with_capacity(reservations.len());

    for reservation in reservations {
        let post_details = match db::get_post(&state.pool, reservation.post_id).await? {
            Some(post) => {
                let donor_details = cached_user(&state, &mut user_cache, &post.donor_uid).await?;
                Some(PostView {
                    post,
                    donor_details,
                    distance_km: None,
                })
            }
            None => None,
        };

        let receiver_details = if user.role == UserRole::Donor {
            cached_user(&state, &mut user_cache, &reservation.receiver_uid).await?
        } else {
            None
        };

        views.push(ReservationView {
            reservation,
            post_details,
            receiver_details,
        });
    }

    Ok(Json(views))
}
