//! Ambient service identity for outbound Vertex AI calls.
//!
//! On Cloud Run / Cloud Functions / GCE the attached service account's access
//! token is served by the metadata server. Tokens are cached until shortly
//! before they expire.

use crate::services::providers::ProviderError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::Secret;
use serde::Deserialize;
use tokio::sync::Mutex;

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Where bearer tokens for the upstream API come from.
pub enum AccessTokenSource {
    /// Fixed token, e.g. from `gcloud auth print-access-token` during development.
    Static(Secret<String>),
    MetadataServer(MetadataServerTokens),
}

impl AccessTokenSource {
    /// Token source backed by the metadata server at `base_url` (scheme and host).
    pub fn metadata_server(client: Client, base_url: &str) -> Self {
        AccessTokenSource::MetadataServer(MetadataServerTokens {
            client,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            cached: Mutex::new(None),
        })
    }

    pub async fn token(&self) -> Result<Secret<String>, ProviderError> {
        match self {
            AccessTokenSource::Static(token) => Ok(token.clone()),
            AccessTokenSource::MetadataServer(tokens) => tokens.token().await,
        }
    }
}

pub struct MetadataServerTokens {
    client: Client,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl MetadataServerTokens {
    async fn token(&self) -> Result<Secret<String>, ProviderError> {
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached.as_ref() {
            if current.expires_at > Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<CachedToken, ProviderError> {
        tracing::debug!(url = %self.token_url, "Fetching access token from metadata server");

        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Auth(format!(
                "metadata server returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Auth(format!("malformed token response: {}", e)))?;

        let expires_at = Duration::try_seconds(body.expires_in)
            .filter(|lifetime| *lifetime >= Duration::zero())
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                ProviderError::Auth(format!("invalid expires_in {}", body.expires_in))
            })?;

        Ok(CachedToken {
            token: Secret::new(body.access_token),
            expires_at,
        })
    }
}
