use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use livecast_db::models::User;

use crate::error::ApiError;
use crate::state::AppState;

/// The credential-verification call must answer within this deadline.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential verification unavailable: {0}")]
    Unavailable(String),
}

/// Identity asserted by the external verification service. The service is
/// opaque to us: a token goes in, a uid (and display name) comes out.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedIdentity {
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

/// Thin HTTP client for the external credential-verification service.
pub struct AuthClient {
    http: reqwest::Client,
    addr: String,
}

impl AuthClient {
    pub fn new(addr: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            addr: addr.into(),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let response = self
            .http
            .post(format!("{}/v1/verify", self.addr))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidCredentials);
        }

        response
            .json::<VerifiedIdentity>()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))
    }
}

/// Extractor asserting a verified, registered user on HTTP routes.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let identity = state.auth.verify(token).await.map_err(|e| {
            warn!(%e, "credential verification failed");
            ApiError::from(e)
        })?;

        let user = state
            .users
            .find_by_uid(&identity.uid)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

        Ok(AuthUser(user))
    }
}
