//! Database layer — migrations, queries, and state transitions.
//!
//! Post lifecycle transitions are expressed as conditional UPDATEs so that
//! two racing requests can never both succeed against a stale read: the
//! loser simply affects zero rows and is rejected by the caller.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;
use crate::models::{
    Coordinates, DeliveryMethod, Disbursement, Donation, FoodPost, Notification, PostStatus,
    Reservation, ReservationStatus, User, UserRole, VerificationStatus,
};

const USER_COLUMNS: &str = "uid, email, role, name, address, phone_number, lat, lng, \
     verification_status, rejection_reason, push_token, bank_name, bank_account, created_at";

const POST_COLUMNS: &str = "id, donor_uid, title, description, quantity, address, lat, lng, \
     expiry, image_url, delivery_method, status, receiver_uid, logistics_uid, created_at, \
     reserved_at, picked_up_at, delivered_at";

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

pub struct NewUser<'a> {
    pub uid: &'a str,
    pub email: &'a str,
    pub role: UserRole,
    pub name: &'a str,
    pub address: &'a str,
    pub phone_number: Option<&'a str>,
    pub coordinates: Option<Coordinates>,
    pub bank_name: Option<&'a str>,
    pub bank_account: Option<&'a str>,
    pub created_at: i64,
}

pub async fn insert_user(pool: &SqlitePool, user: &NewUser<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users
            (uid, email, role, name, address, phone_number, lat, lng,
             verification_status, bank_name, bank_account, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(user.uid)
    .bind(user.email)
    .bind(user.role)
    .bind(user.name)
    .bind(user.address)
    .bind(user.phone_number)
    .bind(user.coordinates.map(|c| c.lat))
    .bind(user.coordinates.map(|c| c.lng))
    .bind(VerificationStatus::Pending)
    .bind(user.bank_name)
    .bind(user.bank_account)
    .bind(user.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user(pool: &SqlitePool, uid: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"
    ))
    .bind(uid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update_push_token(pool: &SqlitePool, uid: &str, token: &str) -> Result<()> {
    sqlx::query("UPDATE users SET push_token = ?2 WHERE uid = ?1")
        .bind(uid)
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// All users awaiting admin verification, oldest first.
pub async fn pending_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE verification_status = ?1 ORDER BY created_at ASC"
    ))
    .bind(VerificationStatus::Pending)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Set a user's verification status. The rejection reason is stored on
/// rejection and cleared on any other outcome. Returns the updated row,
/// or `None` when the user does not exist.
pub async fn set_verification(
    pool: &SqlitePool,
    uid: &str,
    status: VerificationStatus,
    reason: Option<&str>,
) -> Result<Option<User>> {
    let reason = match status {
        VerificationStatus::Rejected => reason,
        _ => None,
    };

    let updated = sqlx::query(
        "UPDATE users SET verification_status = ?2, rejection_reason = ?3 WHERE uid = ?1",
    )
    .bind(uid)
    .bind(status)
    .bind(reason)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }
    get_user(pool, uid).await
}

/// Approved receivers with a known location — the fan-out candidate set
/// for new-post notifications.
pub async fn approved_receivers(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM   users
        WHERE  role = ?1 AND verification_status = ?2
               AND lat IS NOT NULL AND lng IS NOT NULL
        "#
    ))
    .bind(UserRole::Receiver)
    .bind(VerificationStatus::Approved)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Food posts
// ─────────────────────────────────────────────────────────

pub struct NewPost<'a> {
    pub donor_uid: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub quantity: &'a str,
    pub address: &'a str,
    pub coordinates: Coordinates,
    pub expiry: i64,
    pub image_url: Option<&'a str>,
    pub delivery_method: DeliveryMethod,
    pub created_at: i64,
}

pub async fn insert_post(pool: &SqlitePool, post: &NewPost<'_>) -> Result<FoodPost> {
    let id = sqlx::query(
        r#"
        INSERT INTO food_posts
            (donor_uid, title, description, quantity, address, lat, lng,
             expiry, image_url, delivery_method, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(post.donor_uid)
    .bind(post.title)
    .bind(post.description)
    .bind(post.quantity)
    .bind(post.address)
    .bind(post.coordinates.lat)
    .bind(post.coordinates.lng)
    .bind(post.expiry)
    .bind(post.image_url)
    .bind(post.delivery_method)
    .bind(PostStatus::Available)
    .bind(post.created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(FoodPost {
        id,
        donor_uid: post.donor_uid.to_string(),
        title: post.title.to_string(),
        description: post.description.map(str::to_string),
        quantity: post.quantity.to_string(),
        address: post.address.to_string(),
        lat: post.coordinates.lat,
        lng: post.coordinates.lng,
        expiry: post.expiry,
        image_url: post.image_url.map(str::to_string),
        delivery_method: post.delivery_method,
        status: PostStatus::Available,
        receiver_uid: None,
        logistics_uid: None,
        created_at: post.created_at,
        reserved_at: None,
        picked_up_at: None,
        delivered_at: None,
    })
}

pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<FoodPost>> {
    let row = sqlx::query_as::<_, FoodPost>(&format!(
        "SELECT {POST_COLUMNS} FROM food_posts WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All `Available` posts that have not expired, newest first.
pub async fn available_posts(pool: &SqlitePool, now: i64) -> Result<Vec<FoodPost>> {
    let rows = sqlx::query_as::<_, FoodPost>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM   food_posts
        WHERE  status = ?1 AND expiry > ?2
        ORDER  BY created_at DESC
        "#
    ))
    .bind(PostStatus::Available)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn posts_by_donor(pool: &SqlitePool, donor_uid: &str) -> Result<Vec<FoodPost>> {
    let rows = sqlx::query_as::<_, FoodPost>(&format!(
        "SELECT {POST_COLUMNS} FROM food_posts WHERE donor_uid = ?1 ORDER BY created_at DESC"
    ))
    .bind(donor_uid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Atomically reserve an available, unexpired post for `receiver_uid`.
///
/// Returns the number of rows affected: `0` means the post is missing,
/// expired, or was taken by a concurrent request.
pub async fn reserve_post(
    pool: &SqlitePool,
    id: i64,
    receiver_uid: &str,
    now: i64,
) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE food_posts
        SET    status = ?4, receiver_uid = ?2, reserved_at = ?3
        WHERE  id = ?1 AND status = ?5 AND expiry > ?3
        "#,
    )
    .bind(id)
    .bind(receiver_uid)
    .bind(now)
    .bind(PostStatus::Reserved)
    .bind(PostStatus::Available)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

/// `Reserved → Collected`. Returns `0` when the post is not in `Reserved`.
pub async fn collect_post(pool: &SqlitePool, id: i64) -> Result<u64> {
    let affected = sqlx::query("UPDATE food_posts SET status = ?2 WHERE id = ?1 AND status = ?3")
        .bind(id)
        .bind(PostStatus::Collected)
        .bind(PostStatus::Reserved)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected)
}

/// Flip a post to `Expired` regardless of the clock (used when a stale
/// post is discovered during a reservation attempt).
pub async fn expire_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE food_posts SET status = ?2 WHERE id = ?1")
        .bind(id)
        .bind(PostStatus::Expired)
        .execute(pool)
        .await?;
    Ok(())
}

/// Expire every `Available` post whose expiry has passed. Returns the
/// number of posts flipped.
pub async fn expire_stale_posts(pool: &SqlitePool, now: i64) -> Result<u64> {
    let affected =
        sqlx::query("UPDATE food_posts SET status = ?2 WHERE status = ?3 AND expiry <= ?1")
            .bind(now)
            .bind(PostStatus::Expired)
            .bind(PostStatus::Available)
            .execute(pool)
            .await?
            .rows_affected();
    Ok(affected)
}

/// Reserved posts set for delivery that no driver has claimed yet.
pub async fn unassigned_deliveries(pool: &SqlitePool) -> Result<Vec<FoodPost>> {
    let rows = sqlx::query_as::<_, FoodPost>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM   food_posts
        WHERE  status = ?1 AND delivery_method = ?2 AND logistics_uid IS NULL
        ORDER  BY reserved_at ASC
        "#
    ))
    .bind(PostStatus::Reserved)
    .bind(DeliveryMethod::Delivery)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Atomically claim a delivery for a driver. Returns `0` when another
/// driver got there first or the post is not a reserved delivery.
pub async fn assign_driver(pool: &SqlitePool, id: i64, logistics_uid: &str) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE food_posts
        SET    logistics_uid = ?2
        WHERE  id = ?1 AND logistics_uid IS NULL AND status = ?3 AND delivery_method = ?4
        "#,
    )
    .bind(id)
    .bind(logistics_uid)
    .bind(PostStatus::Reserved)
    .bind(DeliveryMethod::Delivery)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

/// `Reserved → In Transit`, stamped with the pickup time. Only the
/// assigned driver can make this transition.
pub async fn mark_in_transit(
    pool: &SqlitePool,
    id: i64,
    logistics_uid: &str,
    now: i64,
) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE food_posts
        SET    status = ?4, picked_up_at = ?3
        WHERE  id = ?1 AND logistics_uid = ?2 AND status = ?5
        "#,
    )
    .bind(id)
    .bind(logistics_uid)
    .bind(now)
    .bind(PostStatus::InTransit)
    .bind(PostStatus::Reserved)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

/// `Reserved | In Transit → Delivered`, stamped with the delivery time.
pub async fn mark_delivered(
    pool: &SqlitePool,
    id: i64,
    logistics_uid: &str,
    now: i64,
) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE food_posts
        SET    status = ?4, delivered_at = ?3
        WHERE  id = ?1 AND logistics_uid = ?2 AND status IN (?5, ?6)
        "#,
    )
    .bind(id)
    .bind(logistics_uid)
    .bind(now)
    .bind(PostStatus::Delivered)
    .bind(PostStatus::Reserved)
    .bind(PostStatus::InTransit)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

// ─────────────────────────────────────────────────────────
// Reservations
// ─────────────────────────────────────────────────────────

pub async fn insert_reservation(
    pool: &SqlitePool,
    post_id: i64,
    receiver_uid: &str,
    donor_uid: &str,
    now: i64,
) -> Result<Reservation> {
    let id = sqlx::query(
        r#"
        INSERT INTO reservations (post_id, receiver_uid, donor_uid, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(post_id)
    .bind(receiver_uid)
    .bind(donor_uid)
    .bind(ReservationStatus::Active)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Reservation {
        id,
        post_id,
        receiver_uid: receiver_uid.to_string(),
        donor_uid: donor_uid.to_string(),
        status: ReservationStatus::Active,
        created_at: now,
    })
}

/// Complete every `Active` reservation against a post (there is at most
/// one, by construction).
pub async fn complete_reservations_for_post(pool: &SqlitePool, post_id: i64) -> Result<u64> {
    let affected =
        sqlx::query("UPDATE reservations SET status = ?2 WHERE post_id = ?1 AND status = ?3")
            .bind(post_id)
            .bind(ReservationStatus::Completed)
            .bind(ReservationStatus::Active)
            .execute(pool)
            .await?
            .rows_affected();
    Ok(affected)
}

pub async fn reservations_for_receiver(
    pool: &SqlitePool,
    receiver_uid: &str,
) -> Result<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, post_id, receiver_uid, donor_uid, status, created_at
        FROM   reservations
        WHERE  receiver_uid = ?1
        ORDER  BY created_at DESC
        "#,
    )
    .bind(receiver_uid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn reservations_for_donor(
    pool: &SqlitePool,
    donor_uid: &str,
) -> Result<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, post_id, receiver_uid, donor_uid, status, created_at
        FROM   reservations
        WHERE  donor_uid = ?1
        ORDER  BY created_at DESC
        "#,
    )
    .bind(donor_uid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────

pub async fn insert_notification(
    pool: &SqlitePool,
    user_uid: &str,
    title: &str,
    body: &str,
    now: i64,
) -> Result<Notification> {
    let id = sqlx::query(
        "INSERT INTO notifications (user_uid, title, body, read, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
    )
    .bind(user_uid)
    .bind(title)
    .bind(body)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Notification {
        id,
        user_uid: user_uid.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        read: false,
        created_at: now,
    })
}

pub async fn notifications_for_user(
    pool: &SqlitePool,
    user_uid: &str,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_uid, title, body, read, created_at
        FROM   notifications
        WHERE  user_uid = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(user_uid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_notification(pool: &SqlitePool, id: i64) -> Result<Option<Notification>> {
    let row = sqlx::query_as::<_, Notification>(
        "SELECT id, user_uid, title, body, read, created_at FROM notifications WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Mark a notification read, but only for its owner. Zero rows means the
/// notification does not exist or belongs to someone else.
pub async fn mark_notification_read(pool: &SqlitePool, id: i64, user_uid: &str) -> Result<u64> {
    let affected = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?1 AND user_uid = ?2")
        .bind(id)
        .bind(user_uid)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected)
}

// ─────────────────────────────────────────────────────────
// Payment ledger
// ─────────────────────────────────────────────────────────

pub struct NewDonation<'a> {
    pub capture_id: &'a str,
    pub order_id: Option<&'a str>,
    pub amount: i64,
    pub currency: &'a str,
    pub status: &'a str,
    pub payer_email: Option<&'a str>,
    pub user_uid: Option<&'a str>,
    pub payload: Option<&'a str>,
    pub created_at: i64,
}

/// Record a captured donation. Duplicate capture ids (capture endpoint plus
/// webhook delivery) are silently ignored; returns whether a row was written.
pub async fn insert_donation(pool: &SqlitePool, donation: &NewDonation<'_>) -> Result<bool> {
    let affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO donations
            (capture_id, order_id, amount, currency, status, payer_email,
             user_uid, payload, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(donation.capture_id)
    .bind(donation.order_id)
    .bind(donation.amount)
    .bind(donation.currency)
    .bind(donation.status)
    .bind(donation.payer_email)
    .bind(donation.user_uid)
    .bind(donation.payload)
    .bind(donation.created_at)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

pub async fn all_donations(pool: &SqlitePool) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(
        r#"
        SELECT capture_id, order_id, amount, currency, status, payer_email, user_uid, created_at
        FROM   donations
        ORDER  BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Sum of captured donation amounts per currency.
pub async fn donation_totals(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT currency, SUM(amount) FROM donations GROUP BY currency",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub struct NewDisbursement<'a> {
    pub receiver_uid: &'a str,
    pub amount: i64,
    pub currency: &'a str,
    pub reference: Option<&'a str>,
    pub note: Option<&'a str>,
    pub created_by: &'a str,
    pub created_at: i64,
}

pub async fn insert_disbursement(
    pool: &SqlitePool,
    disbursement: &NewDisbursement<'_>,
) -> Result<Disbursement> {
    let id = sqlx::query(
        r#"
        INSERT INTO disbursements
            (receiver_uid, amount, currency, reference, note, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(disbursement.receiver_uid)
    .bind(disbursement.amount)
    .bind(disbursement.currency)
    .bind(disbursement.reference)
    .bind(disbursement.note)
    .bind(disbursement.created_by)
    .bind(disbursement.created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Disbursement {
        id,
        receiver_uid: disbursement.receiver_uid.to_string(),
        amount: disbursement.amount,
        currency: disbursement.currency.to_string(),
        reference: disbursement.reference.map(str::to_string),
        note: disbursement.note.map(str::to_string),
        created_by: disbursement.created_by.to_string(),
        created_at: disbursement.created_at,
    })
}

pub async fn all_disbursements(pool: &SqlitePool) -> Result<Vec<Disbursement>> {
    let rows = sqlx::query_as::<_, Disbursement>(
        r#"
        SELECT id, receiver_uid, amount, currency, reference, note, created_by, created_at
        FROM   disbursements
        ORDER  BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Sum of disbursed amounts per currency.
pub async fn disbursement_totals(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT currency, SUM(amount) FROM disbursements GROUP BY currency",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
