//! Push delivery — persists notification rows and forwards them to the
//! mobile messaging service when the target user has a device token.
//!
//! Delivery is best effort: a failed push (or a missing token) never fails
//! the request that triggered it.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db;
use crate::errors::{ApiError, Result};
use crate::models::User;

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    success: i64,
    #[serde(default)]
    failure: i64,
}

#[derive(Clone)]
pub struct PushClient {
    client: Client,
    server_key: Option<String>,
    send_url: String,
}

impl PushClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            server_key: config.fcm_server_key.clone(),
            send_url: config.fcm_send_url.clone(),
        }
    }

    /// Send a single push message to a device token.
    pub async fn send(&self, token: &str, title: &str, body: &str) -> Result<()> {
        let Some(key) = &self.server_key else {
            debug!("FCM_SERVER_KEY is not set; skipping push delivery");
            return Ok(());
        };

        let response = self
            .client
            .post(&self.send_url)
            .header("Authorization", format!("key={key}"))
            .json(&json!({
                "to": token,
                "notification": { "title": title, "body": body },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::BadRequest(format!(
                "Push service returned {}",
                response.status()
            )));
        }

        let result: SendResponse = response.json().await?;
        if result.failure > 0 && result.success == 0 {
            return Err(ApiError::BadRequest(
                "Push service rejected the device token".to_string(),
            ));
        }
        Ok(())
    }
}

/// Record a notification for `user` and attempt push delivery.
///
/// Database and push failures are logged and swallowed — notifications are
/// side effects of a transition that has already happened.
pub async fn notify(pool: &SqlitePool, push: &PushClient, user: &User, title: &str, body: &str) {
    let now = chrono::Utc::now().timestamp();
    if let Err(e) = db::insert_notification(pool, &user.uid, title, body, now).await {
        warn!("Failed to record notification for {}: {e}", user.uid);
    }

    if let Some(token) = &user.push_token {
        if let Err(e) = push.send(token, title, body).await {
            warn!("Push delivery to {} failed: {e}", user.uid);
        }
    }
}
