//! Axum REST API — shared state, router assembly, and the health probe.

pub mod admin;
pub mod auth;
pub mod logistics;
pub mod notifications;
pub mod payments;
pub mod posts;
pub mod reservations;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::IdentityClient;
use crate::config::Config;
use crate::geo::GeocodeClient;
use crate::payments::PayPalClient;
use crate::push::PushClient;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub identity: IdentityClient,
    pub geo: GeocodeClient,
    pub push: PushClient,
    pub paypal: PayPalClient,
}

/// Assemble the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api_v1 = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/me/push-token", post(auth::update_push_token))
        .route("/posts", get(posts::available).post(posts::create))
        .route("/posts/me", get(posts::mine))
        .route("/posts/:id/reserve", put(posts::reserve))
        .route("/posts/:id/collected", put(posts::collected))
        .route("/reservations/me", get(reservations::mine))
        .route("/logistics/available", get(logistics::available))
        .route("/logistics/:id/accept", post(logistics::accept))
        .route("/logistics/:id/status", put(logistics::update_status))
        .route("/admin/users/pending", get(admin::pending_users))
        .route("/admin/users/verify", post(admin::verify_user))
        .route("/admin/finance", get(admin::finance))
        .route("/admin/disbursements", post(admin::create_disbursement))
        .route("/notifications", get(notifications::mine))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route("/payments/create-payment", post(payments::create_payment))
        .route("/payments/:order_id/capture", post(payments::capture))
        .route("/payments/webhook", post(payments::webhook));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
