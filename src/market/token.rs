use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::models::{AccessToken, Credentials};
use crate::api::{Endpoints, HttpRequest, HttpTransport, TokenResponse};
use crate::error::{Result, ScoutError};

/// Exchanges application credentials for a bearer token.
pub struct TokenProvider {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
}

impl TokenProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    fn basic_authorization(credentials: &Credentials) -> String {
        let raw = format!("{}:{}", credentials.client_id(), credentials.client_secret());
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    fn check(credentials: &Credentials) -> Result<()> {
        if credentials.client_id().trim().is_empty() {
            return Err(ScoutError::Credential("client id is missing".to_string()));
        }
        if credentials.client_secret().trim().is_empty() {
            return Err(ScoutError::Credential("client secret is missing".to_string()));
        }
        Ok(())
    }

    /// One grant request per call; retrying is left to the caller.
    pub async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken> {
        Self::check(credentials)?;

        let request = HttpRequest::post(&self.endpoints.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", Self::basic_authorization(credentials))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.endpoints.scope.as_str()),
            ]);

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::error!("Token exchange rejected: {}", response.status);
            return Err(ScoutError::UpstreamAuth {
                status: response.status,
            });
        }

        // A 2xx without a token is still a failed grant, not a search problem.
        let grant: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            tracing::error!("Unreadable token response: {}", e);
            ScoutError::UpstreamAuth {
                status: response.status,
            }
        })?;

        if grant.access_token.is_empty() {
            return Err(ScoutError::UpstreamAuth {
                status: response.status,
            });
        }

        let expires_at = grant
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));

        tracing::debug!("Access token acquired (expires_at: {:?})", expires_at);

        Ok(AccessToken {
            value: grant.access_token,
            expires_at,
        })
    }
}
