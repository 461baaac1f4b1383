use std::time::{Duration, Instant};

use google_cloud_auth::credentials::{self, Credentials};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::GcpBaseConfig;
use crate::error::{GcpProviderError, classify_status, classify_transport};

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Build GCP credentials from a service account JSON key file or inline JSON.
///
/// If `credentials_json` is `Some`, it is used directly.
/// If `credentials_path` is `Some`, the file is read and used.
/// Otherwise, returns `None` for ADC fallback.
///
/// # Errors
///
/// Returns [`GcpProviderError::CredentialError`] if the key is invalid.
pub async fn build_gcp_credentials(
    credentials_path: Option<&str>,
    credentials_json: Option<&str>,
) -> Result<Option<Credentials>, GcpProviderError> {
    let content = if let Some(json) = credentials_json {
        info!("loading GCP credentials from inline JSON");
        json.to_owned()
    } else if let Some(path) = credentials_path {
        info!("loading GCP credentials from service account file");
        tokio::fs::read_to_string(path).await.map_err(|e| {
            GcpProviderError::CredentialError(format!(
                "failed to read credentials file '{path}': {e}"
            ))
        })?
    } else {
        info!("using Application Default Credentials (ADC) for GCP");
        return Ok(None);
    };

    let key_value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| GcpProviderError::CredentialError(format!("invalid credentials JSON: {e}")))?;

    let creds = credentials::service_account::Builder::new(key_value)
        .build()
        .map_err(|e| {
            GcpProviderError::CredentialError(format!(
                "failed to build service account credentials: {e}"
            ))
        })?;

    Ok(Some(creds))
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

enum TokenMode {
    Static(SecretString),
    Metadata {
        http: reqwest::Client,
        url: String,
        cache: RwLock<Option<CachedToken>>,
    },
}

/// Bearer tokens for the REST clients.
///
/// Either a fixed token from configuration (emulators, sidecar-injected
/// tokens) or tokens minted by the instance metadata server, cached until
/// shortly before expiry.
pub struct AccessTokenSource {
    mode: TokenMode,
}

impl std::fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            TokenMode::Static(_) => "static",
            TokenMode::Metadata { .. } => "metadata",
        };
        f.debug_struct("AccessTokenSource")
            .field("mode", &mode)
            .finish_non_exhaustive()
    }
}

impl AccessTokenSource {
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            mode: TokenMode::Static(SecretString::new(token.into())),
        }
    }

    pub fn metadata_server(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            mode: TokenMode::Metadata {
                http,
                url: format!(
                    "{}/instance/service-accounts/default/token",
                    base_url.trim_end_matches('/')
                ),
                cache: RwLock::new(None),
            },
        }
    }

    /// The configured static token if any, the metadata server otherwise.
    pub fn from_config(config: &GcpBaseConfig, http: reqwest::Client) -> Self {
        match config.access_token {
            Some(ref token) => Self::fixed(token.clone()),
            None => Self::metadata_server(http, &config.rest.metadata),
        }
    }

    /// A currently valid bearer token.
    pub async fn token(&self) -> Result<SecretString, GcpProviderError> {
        let (http, url, cache) = match &self.mode {
            TokenMode::Static(token) => return Ok(token.clone()),
            TokenMode::Metadata { http, url, cache } => (http, url, cache),
        };

        if let Some(cached) = cache.read().await.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        let mut slot = cache.write().await;
        if let Some(cached) = slot.as_ref()
            && Instant::now() < cached.refresh_at
        {
            return Ok(cached.token.clone());
        }

        debug!("fetching access token from metadata server");
        let response = http
            .get(url.as_str())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match classify_status(status.as_u16(), &body) {
                GcpProviderError::ServiceError(msg) | GcpProviderError::NotFound(msg) => {
                    GcpProviderError::CredentialError(msg)
                }
                other => other,
            });
        }
        let minted: MetadataToken = response
            .json()
            .await
            .map_err(|e| GcpProviderError::CredentialError(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(minted.expires_in);
        let token = SecretString::new(minted.access_token);
        *slot = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });
        Ok(token)
    }

    /// Attach a bearer token to `request`.
    pub(crate) async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, GcpProviderError> {
        let token = self.token().await?;
        Ok(request.bearer_auth(token.expose_secret()))
    }
}
