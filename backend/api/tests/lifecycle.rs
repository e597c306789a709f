//! Food-post lifecycle: reservation, collection, delivery, and expiry,
//! with particular attention to the race-free conditional transitions.

mod common;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sqlx::SqlitePool;

use common::{add_post, add_user, pool, NOW};
use foodaid_api::api::{logistics, posts, AppState};
use foodaid_api::auth::{AuthUser, IdentityClient, VerifiedUser};
use foodaid_api::config::Config;
use foodaid_api::db;
use foodaid_api::errors::ApiError;
use foodaid_api::geo::GeocodeClient;
use foodaid_api::models::{
    DeliveryMethod, PostStatus, ReservationStatus, UserRole, VerificationStatus,
};
use foodaid_api::payments::PayPalClient;
use foodaid_api::push::PushClient;

const LATER: i64 = NOW + 3600;

/// Application state for calling handlers directly. No provider keys are
/// set, so none of the outbound clients ever leave the process.
fn app_state(pool: SqlitePool) -> Arc<AppState> {
    let config = Config {
        api_port: 0,
        database_url: String::new(),
        identity_api_key: "test-key".to_string(),
        identity_base_url: "http://localhost:9".to_string(),
        maps_api_key: None,
        maps_geocode_url: String::new(),
        fcm_server_key: None,
        fcm_send_url: String::new(),
        paypal_client_id: None,
        paypal_client_secret: None,
        paypal_mode: "sandbox".to_string(),
        notify_radius_km: 25.0,
        notify_fan_out_limit: 50,
        expiry_sweep_secs: 300,
    };
    let client = reqwest::Client::new();
    Arc::new(AppState {
        identity: IdentityClient::new(client.clone(), &config),
        geo: GeocodeClient::new(client.clone(), &config),
        push: PushClient::new(client.clone(), &config),
        paypal: PayPalClient::new(client, &config),
        pool,
        config,
    })
}

#[tokio::test]
async fn reserve_succeeds_once_and_only_once() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo-a", UserRole::Receiver, None).await;
    add_user(&pool, "ngo-b", UserRole::Receiver, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;

    let first = db::reserve_post(&pool, post.id, "ngo-a", NOW).await.unwrap();
    assert_eq!(first, 1);

    // Second receiver raced on a stale read; the conditional UPDATE rejects it.
    let second = db::reserve_post(&pool, post.id, "ngo-b", NOW).await.unwrap();
    assert_eq!(second, 0);

    let post = db::get_post(&pool, post.id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Reserved);
    assert_eq!(post.receiver_uid.as_deref(), Some("ngo-a"));
    assert_eq!(post.reserved_at, Some(NOW));
}

#[tokio::test]
async fn reserve_rejects_expired_posts() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, NOW - 1).await;

    let reserved = db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();
    assert_eq!(reserved, 0);

    db::expire_post(&pool, post.id).await.unwrap();
    let post = db::get_post(&pool, post.id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Expired);
}

#[tokio::test]
async fn collect_only_from_reserved() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;

    // Not reserved yet.
    assert_eq!(db::collect_post(&pool, post.id).await.unwrap(), 0);

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();
    assert_eq!(db::collect_post(&pool, post.id).await.unwrap(), 1);

    // Already collected.
    assert_eq!(db::collect_post(&pool, post.id).await.unwrap(), 0);
}

#[tokio::test]
async fn pickup_flow_completes_the_reservation() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();
    db::insert_reservation(&pool, post.id, "ngo", "donor", NOW)
        .await
        .unwrap();

    db::collect_post(&pool, post.id).await.unwrap();
    let completed = db::complete_reservations_for_post(&pool, post.id)
        .await
        .unwrap();
    assert_eq!(completed, 1);

    let mine = db::reservations_for_receiver(&pool, "ngo").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ReservationStatus::Completed);

    let donors = db::reservations_for_donor(&pool, "donor").await.unwrap();
    assert_eq!(donors.len(), 1);
}

#[tokio::test]
async fn only_one_driver_wins_a_delivery() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "driver-a", UserRole::Logistics, None).await;
    add_user(&pool, "driver-b", UserRole::Logistics, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Delivery, LATER).await;

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();

    let open = db::unassigned_deliveries(&pool).await.unwrap();
    assert_eq!(open.len(), 1);

    assert_eq!(db::assign_driver(&pool, post.id, "driver-a").await.unwrap(), 1);
    assert_eq!(db::assign_driver(&pool, post.id, "driver-b").await.unwrap(), 0);

    // Claimed deliveries drop out of the open list.
    assert!(db::unassigned_deliveries(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn pickup_posts_are_never_offered_to_drivers() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "driver", UserRole::Logistics, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();

    assert!(db::unassigned_deliveries(&pool).await.unwrap().is_empty());
    assert_eq!(db::assign_driver(&pool, post.id, "driver").await.unwrap(), 0);
}

#[tokio::test]
async fn delivery_flow_stamps_each_transition() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "driver", UserRole::Logistics, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Delivery, LATER).await;

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();
    db::assign_driver(&pool, post.id, "driver").await.unwrap();

    // A different driver cannot advance the shipment.
    assert_eq!(
        db::mark_in_transit(&pool, post.id, "someone-else", NOW + 10)
            .await
            .unwrap(),
        0
    );

    assert_eq!(
        db::mark_in_transit(&pool, post.id, "driver", NOW + 10)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        db::mark_delivered(&pool, post.id, "driver", NOW + 20)
            .await
            .unwrap(),
        1
    );

    let post = db::get_post(&pool, post.id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Delivered);
    assert_eq!(post.picked_up_at, Some(NOW + 10));
    assert_eq!(post.delivered_at, Some(NOW + 20));
}

#[tokio::test]
async fn delivered_directly_from_reserved_is_allowed() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "driver", UserRole::Logistics, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Delivery, LATER).await;

    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();
    db::assign_driver(&pool, post.id, "driver").await.unwrap();

    assert_eq!(
        db::mark_delivered(&pool, post.id, "driver", NOW + 5)
            .await
            .unwrap(),
        1
    );
    // But never a second time.
    assert_eq!(
        db::mark_delivered(&pool, post.id, "driver", NOW + 6)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn sweeper_expires_only_stale_available_posts() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;

    let stale = add_post(&pool, "donor", DeliveryMethod::Pickup, NOW - 10).await;
    let fresh = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;
    let reserved = add_post(&pool, "donor", DeliveryMethod::Pickup, NOW - 10).await;
    db::reserve_post(&pool, reserved.id, "ngo", NOW - 100)
        .await
        .unwrap();

    let expired = db::expire_stale_posts(&pool, NOW).await.unwrap();
    assert_eq!(expired, 1);

    let stale = db::get_post(&pool, stale.id).await.unwrap().unwrap();
    let fresh = db::get_post(&pool, fresh.id).await.unwrap().unwrap();
    let reserved = db::get_post(&pool, reserved.id).await.unwrap().unwrap();
    assert_eq!(stale.status, PostStatus::Expired);
    assert_eq!(fresh.status, PostStatus::Available);
    assert_eq!(reserved.status, PostStatus::Reserved);
}

#[tokio::test]
async fn feed_lists_only_available_unexpired_posts_newest_first() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;

    add_post(&pool, "donor", DeliveryMethod::Pickup, NOW - 1).await;
    let open = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;
    let taken = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;
    db::reserve_post(&pool, taken.id, "ngo", NOW).await.unwrap();

    let feed = db::available_posts(&pool, NOW).await.unwrap();
    let ids: Vec<i64> = feed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![open.id]);
}

#[tokio::test]
async fn feed_is_browsable_before_verification() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    // The handler checks expiry against the wall clock.
    let expiry = chrono::Utc::now().timestamp() + 3600;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, expiry).await;

    let ngo = db::get_user(&pool, "ngo").await.unwrap().unwrap();
    assert_eq!(ngo.verification_status, VerificationStatus::Pending);

    let state = app_state(pool);
    let response = posts::available(
        State(state),
        AuthUser(ngo),
        Query(posts::FeedQuery {
            lat: None,
            lng: None,
        }),
    )
    .await
    .unwrap()
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let feed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["id"], serde_json::json!(post.id));
}

#[tokio::test]
async fn accepting_a_pickup_post_names_the_method() {
    let pool = pool().await;
    add_user(&pool, "donor", UserRole::Donor, None).await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "driver", UserRole::Logistics, None).await;
    let post = add_post(&pool, "donor", DeliveryMethod::Pickup, LATER).await;
    db::reserve_post(&pool, post.id, "ngo", NOW).await.unwrap();

    db::set_verification(&pool, "driver", VerificationStatus::Approved, None)
        .await
        .unwrap();
    let driver = db::get_user(&pool, "driver").await.unwrap().unwrap();

    let state = app_state(pool);
    let err = logistics::accept(State(state), VerifiedUser(driver), Path(post.id))
        .await
        .err()
        .expect("a pickup post must not be acceptable");
    assert!(matches!(
        err,
        ApiError::BadRequest(ref m) if m.contains("Pickup, not Delivery")
    ));
}
