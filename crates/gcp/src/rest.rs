use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::AccessTokenSource;
use crate::config::{GcpBaseConfig, RestEndpoints};
use crate::error::{GcpProviderError, classify_status, classify_transport};

/// Authenticated JSON client for the Google REST APIs.
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    tokens: Arc<AccessTokenSource>,
    endpoints: RestEndpoints,
}

impl RestClient {
    /// Build a client with the configured request timeout and token source.
    ///
    /// # Errors
    ///
    /// Returns [`GcpProviderError::Configuration`] if the HTTP client cannot
    /// be built.
    pub fn new(config: &GcpBaseConfig) -> Result<Self, GcpProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GcpProviderError::Configuration(format!("HTTP client error: {e}")))?;
        let tokens = AccessTokenSource::from_config(config, http.clone());
        Ok(Self {
            http,
            tokens: Arc::new(tokens),
            endpoints: config.rest.clone(),
        })
    }

    pub fn endpoints(&self) -> &RestEndpoints {
        &self.endpoints
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GcpProviderError> {
        let request = self.http.get(url).query(query);
        self.execute(Method::GET, url, request).await
    }

    pub(crate) async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T, GcpProviderError> {
        let request = self.http.request(method.clone(), url).json(body);
        self.execute(method, url, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GcpProviderError> {
        debug!(%method, url, "GCP REST call");
        let request = self.tokens.authorize(request).await?;
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }
        let body = if body.trim().is_empty() { "{}" } else { &body };
        serde_json::from_str(body).map_err(|e| {
            GcpProviderError::InvalidPayload(format!("{method} {url}: {e}"))
        })
    }
}
