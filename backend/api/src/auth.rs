//! Identity-provider client and request authentication extractors.
//!
//! Account creation and bearer-token verification are both delegated to the
//! managed identity provider's REST API; this module only shuttles the
//! results into profile rows and request guards.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::api::AppState;
use crate::config::Config;
use crate::db;
use crate::errors::{ApiError, Result};
use crate::models::{User, UserRole, VerificationStatus};

/// The identity attested by a verified bearer token.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(rename = "localId")]
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    users: Option<Vec<LookupUser>>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl IdentityClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.identity_api_key.clone(),
            base_url: config.identity_base_url.clone(),
        }
    }

    /// Create an email/password account at the provider; returns the new uid.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<String> {
        let url = format!("{}/v1/accounts:signUp?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = provider_error_message(response).await;
            if message.contains("EMAIL_EXISTS") {
                return Err(ApiError::BadRequest(
                    "The email address is already in use by another account.".to_string(),
                ));
            }
            return Err(ApiError::Unauthorized(format!(
                "Account creation failed: {message}"
            )));
        }

        let body: SignUpResponse = response.json().await?;
        Ok(body.local_id)
    }

    /// Verify an ID token against the provider and return the account it
    /// belongs to. Any provider-side rejection maps to 401.
    pub async fn verify_token(&self, id_token: &str) -> Result<TokenIdentity> {
        let url = format!("{}/v1/accounts:lookup?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = provider_error_message(response).await;
            return Err(ApiError::Unauthorized(format!(
                "Invalid authentication: {message}"
            )));
        }

        let body: LookupResponse = response.json().await?;
        let account = body
            .users
            .and_then(|mut users| users.pop())
            .ok_or_else(|| {
                ApiError::Unauthorized("Invalid authentication: no account for token".to_string())
            })?;

        Ok(TokenIdentity {
            uid: account.local_id,
            email: account.email,
        })
    }
}

async fn provider_error_message(response: reqwest::Response) -> String {
    match response.json::<ProviderError>().await {
        Ok(err) => err.error.message,
        Err(e) => {
            warn!("Unparseable identity-provider error body: {e}");
            "provider rejected the request".to_string()
        }
    }
}

// ─────────────────────────────────────────────────────────
// Request guards
// ─────────────────────────────────────────────────────────

/// Any authenticated caller with a profile row.
pub struct AuthUser(pub User);

/// An authenticated caller whose account an admin has approved.
pub struct VerifiedUser(pub User);

/// An authenticated caller with the Admin role.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::Unauthorized("No authorization credentials provided".to_string())
        })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self> {
        let token = bearer_token(parts)?;
        let identity = state.identity.verify_token(token).await?;

        let user = db::get_user(&state.pool, &identity.uid)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("User profile not found. Please register.".to_string())
            })?;

        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for VerifiedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_verified(&user)?;
        Ok(VerifiedUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(ApiError::Forbidden("Admin privileges required.".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// Reject callers whose account an admin has not (yet) approved.
pub fn require_verified(user: &User) -> Result<()> {
    if user.verification_status != VerificationStatus::Approved {
        return Err(ApiError::Forbidden(format!(
            "Account not verified. Status: {:?}",
            user.verification_status
        )));
    }
    Ok(())
}

/// Reject callers that are not acting in `role`.
pub fn require_role(user: &User, role: UserRole, detail: &str) -> Result<()> {
    if user.role != role {
        return Err(ApiError::Forbidden(detail.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, status: VerificationStatus) -> User {
        User {
            uid: "u1".to_string(),
            email: "u1@test.org".to_string(),
            role,
            name: "u1".to_string(),
            address: String::new(),
            phone_number: None,
            lat: None,
            lng: None,
            verification_status: status,
            rejection_reason: None,
            push_token: None,
            bank_name: None,
            bank_account: None,
            created_at: 0,
        }
    }

    #[test]
    fn verification_gate_admits_only_approved_accounts() {
        let approved = user(UserRole::Receiver, VerificationStatus::Approved);
        assert!(require_verified(&approved).is_ok());

        for status in [VerificationStatus::Pending, VerificationStatus::Rejected] {
            let blocked = user(UserRole::Receiver, status);
            assert!(matches!(
                require_verified(&blocked),
                Err(ApiError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn role_gate_rejects_other_roles() {
        let donor = user(UserRole::Donor, VerificationStatus::Approved);
        assert!(require_role(&donor, UserRole::Donor, "donors only").is_ok());
        assert!(matches!(
            require_role(&donor, UserRole::Receiver, "receivers only"),
            Err(ApiError::Forbidden(_))
        ));
    }
}
