//! Domain records and enums shared across the API.
//!
//! All timestamps are unix epoch seconds (UTC). Geocoded locations are
//! stored as nullable `lat`/`lng` column pairs and surfaced through
//! [`Coordinates`] where a single point is wanted.

use serde::{Deserialize, Serialize};

/// A geographic point, used for geocoded addresses and distance sorting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum UserRole {
    Donor,
    Receiver,
    Admin,
    Logistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Lifecycle of a food post.
///
/// `Collected` terminates the pickup flow; `InTransit`/`Delivered` belong to
/// the driver-assisted delivery flow. Either flow can end in `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum PostStatus {
    Available,
    Reserved,
    Collected,
    #[serde(rename = "In Transit")]
    #[sqlx(rename = "In Transit")]
    InTransit,
    Delivered,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum DeliveryMethod {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ReservationStatus {
    Active,
    Completed,
    Cancelled,
}

/// A user profile row. The `uid` is the identity-provider account id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
    pub name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub push_token: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
    pub created_at: i64,
}

impl User {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// The subset of a profile safe to embed in responses seen by other users
/// (no push token, no banking details).
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
    pub name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            address: user.address.clone(),
            phone_number: user.phone_number.clone(),
            coordinates: user.coordinates(),
            verification_status: user.verification_status,
            rejection_reason: user.rejection_reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FoodPost {
    pub id: i64,
    pub donor_uid: String,
    pub title: String,
    pub description: Option<String>,
    pub quantity: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub expiry: i64,
    pub image_url: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub status: PostStatus,
    pub receiver_uid: Option<String>,
    pub logistics_uid: Option<String>,
    pub created_at: i64,
    pub reserved_at: Option<i64>,
    pub picked_up_at: Option<i64>,
    pub delivered_at: Option<i64>,
}

impl FoodPost {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: i64,
    pub post_id: i64,
    pub receiver_uid: String,
    pub donor_uid: String,
    pub status: ReservationStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_uid: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: i64,
}

/// A captured payment, keyed by the provider-side capture id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donation {
    pub capture_id: String,
    pub order_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub payer_email: Option<String>,
    pub user_uid: Option<String>,
    pub created_at: i64,
}

/// An admin-recorded payout to a receiver organisation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Disbursement {
    pub id: i64,
    pub receiver_uid: String,
    pub amount: i64,
    pub currency: String,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}
