//! Food-post handlers — the feed, creation with notification fan-out, and
//! the reserve/collect transitions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{require_role, AuthUser, VerifiedUser};
use crate::db;
use crate::errors::{ApiError, Result};
use crate::geo;
use crate::models::{DeliveryMethod, FoodPost, PostStatus, User, UserPublic, UserRole};
use crate::push;

use super::AppState;

/// A post as clients see it: the row plus the cached donor summary and,
/// when the caller supplied a location, the distance to the pickup point.
#[derive(Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: FoodPost,
    pub donor_details: Option<UserPublic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Fetch a user's public summary, memoizing per-request lookups.
pub(super) async fn cached_user(
    state: &AppState,
    cache: &mut HashMap<String, Option<UserPublic>>,
    uid: &str,
) -> Result<Option<UserPublic>> {
    if let Some(hit) = cache.get(uid) {
        return Ok(hit.clone());
    }
    let user = db::get_user(&state.pool, uid).await?;
    let public = user.as_ref().map(UserPublic::from);
    cache.insert(uid.to_string(), public.clone());
    Ok(public)
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: Option<String>,
    pub quantity: String,
    pub address: String,
    pub expiry: DateTime<Utc>,
    pub image_url: Option<String>,
    #[serde(default = "default_delivery_method")]
    pub delivery_method: DeliveryMethod,
}

fn default_delivery_method() -> DeliveryMethod {
    DeliveryMethod::Pickup
}

/// `GET /api/v1/posts?lat&lng`
///
/// Available, unexpired posts. Distance-sorted when the caller provides a
/// location, newest-first otherwise. Browsing only needs a valid token;
/// a still-pending account can look but not reserve.
pub async fn available(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse> {
    let now = Utc::now().timestamp();
    let posts = db::available_posts(&state.pool, now).await?;

    let caller = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some(crate::models::Coordinates { lat, lng }),
        _ => None,
    };

    let mut cache = HashMap::new();
    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let donor_details = cached_user(&state, &mut cache, &post.donor_uid).await?;
        let distance_km = caller.map(|c| geo::haversine_km(c, post.coordinates()));
        views.push(PostView {
            post,
            donor_details,
            distance_km,
        });
    }

    if caller.is_some() {
        views.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    Ok(Json(views))
}

/// `POST /api/v1/posts`
///
/// Verified Donors only. Geocodes the pickup address and fans out
/// notifications to nearby approved receivers in the background.
pub async fn create(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse> {
    require_role(
        &user,
        UserRole::Donor,
        "Only Donors are allowed to create new posts.",
    )?;

    let coordinates = state.geo.geocode(&req.address).await?.ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Could not find coordinates for address: {}. Please try a more specific address.",
            req.address
        ))
    })?;

    let now = Utc::now().timestamp();
    let expiry = req.expiry.timestamp();
    if expiry <= now {
        return Err(ApiError::BadRequest(
            "Expiry must be in the future.".to_string(),
        ));
    }

    let post = db::insert_post(
        &state.pool,
        &db::NewPost {
            donor_uid: &user.uid,
            title: &req.title,
            description: req.description.as_deref(),
            quantity: &req.quantity,
            address: &req.address,
            coordinates,
            expiry,
            image_url: req.image_url.as_deref(),
            delivery_method: req.delivery_method,
            created_at: now,
        },
    )
    .await?;

    tokio::spawn(fan_out(state.clone(), post.clone()));

    Ok((
        StatusCode::CREATED,
        Json(PostView {
            donor_details: Some(UserPublic::from(&user)),
            distance_km: None,
            post,
        }),
    ))
}

/// Notify approved receivers near a fresh post, nearest first. Runs as a
/// detached task; failures only reach the logs.
async fn fan_out(state: Arc<AppState>, post: FoodPost) {
    let receivers = match db::approved_receivers(&state.pool).await {
        Ok(receivers) => receivers,
        Err(e) => {
            warn!("Fan-out for post {} aborted: {e}", post.id);
            return;
        }
    };

    let targets: Vec<User> = geo::within_radius(
        receivers,
        post.coordinates(),
        state.config.notify_radius_km,
        state.config.notify_fan_out_limit,
    );
    if targets.is_empty() {
        return;
    }

    info!("Notifying {} receivers about post {}", targets.len(), post.id);
    let body = format!("{} ({}) was just posted near you.", post.title, post.quantity);
    for receiver in &targets {
        push::notify(
            &state.pool,
            &state.push,
            receiver,
            "New food available nearby",
            &body,
        )
        .await;
    }
}

/// `GET /api/v1/posts/me`
pub async fn mine(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
) -> Result<impl IntoResponse> {
    let posts = db::posts_by_donor(&state.pool, &user.uid).await?;
    let donor_details = UserPublic::from(&user);

    let views: Vec<PostView> = posts
        .into_iter()
        .map(|post| PostView {
            post,
            donor_details: Some(donor_details.clone()),
            distance_km: None,
        })
        .collect();

    Ok(Json(views))
}

/// `PUT /api/v1/posts/:id/reserve`
///
/// Verified Receivers only. The transition is a single conditional UPDATE,
/// so two concurrent reservations can never both succeed.
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    require_role(
        &user,
        UserRole::Receiver,
        "Only Receivers are allowed to reserve posts.",
    )?;

    let now = Utc::now().timestamp();
    let reserved = db::reserve_post(&state.pool, id, &user.uid, now).await?;

    if reserved == 0 {
        // Zero rows: distinguish missing / expired / taken for the caller.
        let post = db::get_post(&state.pool, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Food post not found.".to_string()))?;

        if post.status == PostStatus::Available && post.expiry <= now {
            db::expire_post(&state.pool, id).await?;
            return Err(ApiError::BadRequest("This post has expired.".to_string()));
        }
        return Err(ApiError::BadRequest(
            "This post is no longer available.".to_string(),
        ));
    }

    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food post not found.".to_string()))?;

    db::insert_reservation(&state.pool, id, &user.uid, &post.donor_uid, now).await?;

    if let Some(donor) = db::get_user(&state.pool, &post.donor_uid).await? {
        push::notify(
            &state.pool,
            &state.push,
            &donor,
            "Post reserved",
            &format!("{} has reserved \"{}\".", user.name, post.title),
        )
        .await;

        return Ok(Json(PostView {
            donor_details: Some(UserPublic::from(&donor)),
            distance_km: None,
            post,
        }));
    }

    Ok(Json(PostView {
        post,
        donor_details: None,
        distance_km: None,
    }))
}

/// `PUT /api/v1/posts/:id/collected`
///
/// The post's Donor or its Receiver marks a reserved post as picked up.
pub async fn collected(
    State(state): State<Arc<AppState>>,
    VerifiedUser(user): VerifiedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food post not found.".to_string()))?;

    let is_donor = user.role == UserRole::Donor && post.donor_uid == user.uid;
    let is_receiver =
        user.role == UserRole::Receiver && post.receiver_uid.as_deref() == Some(user.uid.as_str());
    if !(is_donor || is_receiver) {
        return Err(ApiError::Forbidden(
            "You are not authorized to update this post.".to_string(),
        ));
    }

    let collected = db::collect_post(&state.pool, id).await?;
    if collected == 0 {
        return Err(ApiError::BadRequest(
            "Only a 'Reserved' post can be marked 'Collected'.".to_string(),
        ));
    }
    db::complete_reservations_for_post(&state.pool, id).await?;

    let post = db::get_post(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Food post not found.".to_string()))?;

    let mut cache = HashMap::new();
    let donor_details = cached_user(&state, &mut cache, &post.donor_uid).await?;
    Ok(Json(PostView {
        post,
        donor_details,
        distance_km: None,
    }))
}
