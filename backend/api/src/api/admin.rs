//! Admin handlers — user verification and the finance ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::db;
use crate::errors::{ApiError, Result};
use crate::models::{Disbursement, Donation, UserPublic, UserRole, VerificationStatus};
use crate::push;

use super::AppState;

#[derive(Deserialize)]
pub struct VerificationUpdate {
    pub user_uid: String,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct DisbursementRequest {
    pub receiver_uid: String,
    pub amount: i64,
    pub currency: String,
    pub reference: Option<String>,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub donated: i64,
    pub disbursed: i64,
}

#[derive(Serialize)]
pub struct FinanceResponse {
    pub donations: Vec<Donation>,
    pub disbursements: Vec<Disbursement>,
    pub totals: Vec<CurrencyTotal>,
}

/// `GET /api/v1/admin/users/pending`
pub async fn pending_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse> {
    let users = db::pending_users(&state.pool).await?;
    let public: Vec<UserPublic> = users.iter().map(UserPublic::from).collect();
    Ok(Json(public))
}

/// `POST /api/v1/admin/users/verify`
///
/// Approve or reject a pending user; the user is push-notified either way.
pub async fn verify_user(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(update): Json<VerificationUpdate>,
) -> Result<impl IntoResponse> {
    if update.status == VerificationStatus::Pending {
        return Err(ApiError::BadRequest(
            "Verification can only be set to Approved or Rejected.".to_string(),
        ));
    }

    let user = db::set_verification(
        &state.pool,
        &update.user_uid,
        update.status,
        update.rejection_reason.as_deref(),
    )
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!("User with ID {} not found.", update.user_uid))
    })?;

    let mut body = format!("Your account has been {:?}.", user.verification_status);
    if let (VerificationStatus::Rejected, Some(reason)) =
        (user.verification_status, &user.rejection_reason)
    {
        body.push_str(&format!(" Reason: {reason}"));
    }
    push::notify(
        &state.pool,
        &state.push,
        &user,
        "Account Verification Update",
        &body,
    )
    .await;

    Ok(Json(UserPublic::from(&user)))
}

/// `GET /api/v1/admin/finance`
///
/// The full payment ledger with per-currency donation/disbursement totals.
pub async fn finance(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse> {
    let donations = db::all_donations(&state.pool).await?;
    let disbursements = db::all_disbursements(&state.pool).await?;

    let mut totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for (currency, donated) in db::donation_totals(&state.pool).await? {
        totals.entry(currency).or_default().0 = donated;
    }
    for (currency, disbursed) in db::disbursement_totals(&state.pool).await? {
        totals.entry(currency).or_default().1 = disbursed;
    }

    let totals = totals
        .into_iter()
        .map(|(currency, (donated, disbursed))| CurrencyTotal {
            currency,
            donated,
            disbursed,
        })
        .collect();

    Ok(Json(FinanceResponse {
        donations,
        disbursements,
        totals,
    }))
}

/// `POST /api/v1/admin/disbursements`
///
/// Record a payout to a receiver organisation.
pub async fn create_disbursement(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<DisbursementRequest>,
) -> Result<impl IntoResponse> {
    if req.amount <= 0 {
        return Err(ApiError::BadRequest(
            "Disbursement amount must be positive.".to_string(),
        ));
    }

    let receiver = db::get_user(&state.pool, &req.receiver_uid)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("User with ID {} not found.", req.receiver_uid))
        })?;
    if receiver.role != UserRole::Receiver {
        return Err(ApiError::BadRequest(
            "Disbursements can only be recorded against Receiver accounts.".to_string(),
        ));
    }

    let disbursement = db::insert_disbursement(
        &state.pool,
        &db::NewDisbursement {
            receiver_uid: &req.receiver_uid,
            amount: req.amount,
            currency: &req.currency.to_lowercase(),
            reference: req.reference.as_deref(),
            note: req.note.as_deref(),
            created_by: &admin.uid,
            created_at: Utc::now().timestamp(),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(disbursement)))
}
