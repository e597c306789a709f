//! PayPal REST client — order creation, capture, and payload decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::{ApiError, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The ledger-relevant slice of a completed capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub capture_id: String,
    /// Amount in minor units (cents).
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: String,
}

impl PayPalClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            client_id: config.paypal_client_id.clone(),
            client_secret: config.paypal_client_secret.clone(),
            base_url: config.paypal_base_url().to_string(),
        }
    }

    /// Exchange client credentials for an access token.
    async fn access_token(&self) -> Result<String> {
        let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return Err(ApiError::Payment(
                "PayPal credentials are not configured on the server.".to_string(),
            ));
        };

        let auth = BASE64.encode(format!("{id}:{secret}"));
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .header("Authorization", format!("Basic {auth}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Payment(format!(
                "Failed to authenticate with PayPal: {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        Ok(body.access_token)
    }

    /// Create an order for `amount` minor units of `currency`.
    /// Returns the provider's order object.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        payer_email: &str,
        user_uid: &str,
    ) -> Result<Value> {
        let token = self.access_token().await?;

        let payload = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": currency.to_uppercase(),
                    "value": major_units(amount),
                },
                "description": "FoodAid Donation",
                "custom_id": user_uid,
            }],
            "payer": { "email_address": payer_email },
            "application_context": {
                "brand_name": "FoodAid",
                "user_action": "PAY_NOW",
            },
        });

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Payment(format!(
                "Error creating PayPal order: {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Capture an approved order. Returns the provider's capture object.
    pub async fn capture_order(&self, order_id: &str) -> Result<Value> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.base_url
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Payment(format!(
                "Error capturing PayPal order {order_id}: {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

/// Render a minor-unit amount as the provider's major-unit decimal string
/// (1050 → "10.50").
pub fn major_units(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

/// Parse a provider major-unit decimal string into minor units
/// ("10.50" → 1050).
pub fn minor_units(value: &str) -> Option<i64> {
    let parsed: f64 = value.parse().ok()?;
    Some((parsed * 100.0).round() as i64)
}

/// Pull the first completed capture out of an order-capture response.
pub fn extract_capture(order: &Value) -> Option<CaptureSummary> {
    let capture = order
        .get("purchase_units")?
        .get(0)?
        .get("payments")?
        .get("captures")?
        .get(0)?;
    summarize_capture(capture)
}

/// Summarize a bare capture resource (the shape webhook events carry).
pub fn summarize_capture(capture: &Value) -> Option<CaptureSummary> {
    let amount = capture.get("amount")?;
    Some(CaptureSummary {
        capture_id: capture.get("id")?.as_str()?.to_string(),
        amount: minor_units(amount.get("value")?.as_str()?)?,
        currency: amount
            .get("currency_code")?
            .as_str()?
            .to_lowercase(),
        status: capture
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string(),
    })
}
