//! Shared fixtures for the integration tests: an in-memory database and
//! canned users/posts.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use foodaid_api::db;
use foodaid_api::models::{Coordinates, DeliveryMethod, FoodPost, UserRole};

pub const NOW: i64 = 1_700_000_000;

/// One connection only: each connection to `sqlite::memory:` is its own
/// database, so the pool must never open a second one.
pub async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

pub async fn add_user(pool: &SqlitePool, uid: &str, role: UserRole, coords: Option<Coordinates>) {
    db::insert_user(
        pool,
        &db::NewUser {
            uid,
            email: &format!("{uid}@test.org"),
            role,
            name: uid,
            address: "1 Test Street",
            phone_number: None,
            coordinates: coords,
            bank_name: None,
            bank_account: None,
            created_at: NOW,
        },
    )
    .await
    .expect("insert user");
}

pub async fn add_post(
    pool: &SqlitePool,
    donor_uid: &str,
    method: DeliveryMethod,
    expiry: i64,
) -> FoodPost {
    db::insert_post(
        pool,
        &db::NewPost {
            donor_uid,
            title: "Day-old bread",
            description: Some("Two crates from this morning"),
            quantity: "2 crates",
            address: "1 Bakery Lane",
            coordinates: Coordinates {
                lat: -26.2041,
                lng: 28.0473,
            },
            expiry,
            image_url: None,
            delivery_method: method,
            created_at: NOW,
        },
    )
    .await
    .expect("insert post")
}
