//! HTTP client for the Fanline Content API.
//!
//! Provides a minimal client with configurable auth (Bearer token or
//! X-API-Key), generic JSON helpers, and the [`ContentApi`] trait the
//! upload pipeline is written against. The pipeline and its tests depend
//! only on the trait; this crate supplies the reqwest-backed implementation.

pub mod api;
pub mod traits;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// API version prefix (e.g. "/api/v1"). Set FANLINE_API_VERSION to match
/// the server.
pub fn api_prefix() -> String {
    let version = std::env::var("FANLINE_API_VERSION").unwrap_or_else(|_| "v1".to_string());
    format!("/api/{}", version)
}

/// HTTP client for the Fanline Content API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create client from environment: FANLINE_API_URL (or API_URL),
    /// FANLINE_API_KEY (or API_KEY). Uses Bearer auth by default since the
    /// pipeline acts on behalf of a signed-in creator.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("FANLINE_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let token = std::env::var("FANLINE_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .context("Missing API key. Set FANLINE_API_KEY or API_KEY")?;

        Self::new(base_url, Auth::Bearer(token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    /// Fail on non-2xx, including the response body in the error.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(anyhow::anyhow!(
            "API request failed with status {}: {}",
            status,
            error_text
        ))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        Self::ensure_success(response)
            .await?
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.build_url(path);
        let mut request = self.apply_auth(self.client.get(&url));
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).json(body));
        let response = request.send().await.context("Failed to send request")?;
        Self::read_json(response).await
    }

    /// POST JSON body where the server replies with no content.
    pub async fn post_json_empty<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).json(body));
        let response = request.send().await.context("Failed to send request")?;
        Self::ensure_success(response).await.map(|_| ())
    }

    /// PUT JSON body where the server replies with no content.
    pub async fn put_json_empty<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.put(&url).json(body));
        let response = request.send().await.context("Failed to send request")?;
        Self::ensure_success(response).await.map(|_| ())
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.delete(&url));
        let response = request.send().await.context("Failed to send request")?;
        Self::ensure_success(response).await.map(|_| ())
    }

    /// Raw client for requests outside the API origin (presigned uploads).
    pub fn client(&self) -> &Client {
        &self.client
    }
}

// Re-export the trait and wire types for convenience.
pub use api::{
    BatchProcessRequest, PlannedUploadEntry, PlannedUploadGrant, TempVideoPlayback,
    TempVideoUploadAuthorization, TempVideoUploadRequest, UploadPlanRequest, UploadPlanResponse,
};
pub use traits::{ContentApi, ProgressFn};
