//! Donation payment handlers — PayPal order creation, capture, and the
//! provider webhook.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::auth::AuthUser;
use crate::db;
use crate::errors::{ApiError, Result};
use crate::payments;

use super::AppState;

#[derive(Deserialize)]
pub struct DonationRequest {
    /// Donation amount in minor units (cents).
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub email: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Deserialize)]
pub struct WebhookEvent {
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub resource: Option<Value>,
}

/// `POST /api/v1/payments/create-payment`
///
/// Creates a PayPal order; the client uses the returned order id to drive
/// the approval flow.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<DonationRequest>,
) -> Result<impl IntoResponse> {
    if req.amount <= 0 {
        return Err(ApiError::BadRequest(
            "Donation amount must be positive.".to_string(),
        ));
    }

    let order = state
        .paypal
        .create_order(req.amount, &req.currency, &req.email, &user.uid)
        .await?;

    let order_id = order
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Payment("Order response carried no id".to_string()))?;

    Ok(Json(serde_json::json!({
        "order_id": order_id,
        "status": order.get("status").and_then(Value::as_str).unwrap_or("CREATED"),
        "links": order.get("links").cloned().unwrap_or(Value::Array(vec![])),
    })))
}

/// `POST /api/v1/payments/:order_id/capture`
///
/// Captures an approved order and writes completed captures to the ledger.
pub async fn capture(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse> {
    let capture = state.paypal.capture_order(&order_id).await?;

    if capture.get("status").and_then(Value::as_str) == Some("COMPLETED") {
        if let Some(summary) = payments::extract_capture(&capture) {
            let payload = serde_json::to_string(&capture)?;
            let recorded = db::insert_donation(
                &state.pool,
                &db::NewDonation {
                    capture_id: &summary.capture_id,
                    order_id: Some(&order_id),
                    amount: summary.amount,
                    currency: &summary.currency,
                    status: &summary.status,
                    payer_email: Some(&user.email),
                    user_uid: Some(&user.uid),
                    payload: Some(&payload),
                    created_at: Utc::now().timestamp(),
                },
            )
            .await?;
            if recorded {
                info!("Recorded donation {} for {}", summary.capture_id, user.uid);
            }
        }
    }

    Ok(Json(capture))
}

/// `POST /api/v1/payments/webhook`
///
/// Records `PAYMENT.CAPTURE.COMPLETED` events. The capture id keys the
/// ledger, so a capture already written by the capture endpoint is a no-op.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<WebhookEvent>,
) -> Result<impl IntoResponse> {
    if event.event_type.as_deref() == Some("PAYMENT.CAPTURE.COMPLETED") {
        let resource = event
            .resource
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("Webhook event has no resource".to_string()))?;
        let summary = payments::summarize_capture(resource).ok_or_else(|| {
            ApiError::BadRequest("Webhook resource is not a capture".to_string())
        })?;

        let payload = serde_json::to_string(resource)?;
        let recorded = db::insert_donation(
            &state.pool,
            &db::NewDonation {
                capture_id: &summary.capture_id,
                order_id: None,
                amount: summary.amount,
                currency: &summary.currency,
                status: &summary.status,
                payer_email: None,
                user_uid: None,
                payload: Some(&payload),
                created_at: Utc::now().timestamp(),
            },
        )
        .await?;
        if recorded {
            info!(
                "Recorded donation {} from webhook event {:?}",
                summary.capture_id, event.id
            );
        }
    }

    Ok(Json(serde_json::json!({ "status": "received" })))
}
