//! REST API seam.
//!
//! The coordinator only talks to the backend through [`SyncApi`], so tests
//! can replace the network with an in-process fake.

use berth_engine::{ActionKind, CollectionName};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::config::Config;
use crate::error::{ClientError, Result};

/// Calls the offline layer makes against the backend.
pub trait SyncApi: Send + Sync {
    /// Pull the full contents of a collection.
    fn fetch_collection(&self, name: CollectionName) -> BoxFuture<'_, Result<Vec<serde_json::Value>>>;

    /// Deliver one mutation; returns the server's response body.
    fn submit(
        &self,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;

    /// Check that the backend is reachable.
    fn ping(&self) -> BoxFuture<'_, Result<()>>;
}

/// [`SyncApi`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        }
    }

    /// Build a client from configuration, including the bearer token.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            user_id: config.user_id.clone(),
        })
    }

    /// GET path used to pull a collection.
    pub fn collection_path(&self, name: CollectionName) -> String {
        match name {
            CollectionName::Boats => "/api/boats".to_string(),
            CollectionName::Bookings => format!("/api/bookings/user/{}", self.user_id),
            CollectionName::Messages => format!("/api/messages/user/{}", self.user_id),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_collection(&self, name: CollectionName) -> Result<Vec<serde_json::Value>> {
        let url = self.url(&self.collection_path(name));
        tracing::debug!(collection = %name, %url, "Pulling collection");

        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn post_action(
        &self,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.url(kind.endpoint());
        tracing::debug!(kind = %kind, %url, "Submitting action");

        let response = Self::check(self.http.post(&url).json(&payload).send().await?).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn probe(&self) -> Result<()> {
        let response = self.http.get(self.url("/api/boats")).send().await?;
        // Any answer from the server means it is reachable.
        if response.status().is_server_error() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                body: "server unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl SyncApi for HttpApi {
    fn fetch_collection(&self, name: CollectionName) -> BoxFuture<'_, Result<Vec<serde_json::Value>>> {
        self.get_collection(name).boxed()
    }

    fn submit(
        &self,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        self.post_action(kind, payload).boxed()
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        self.probe().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_paths() {
        let api = HttpApi::new("http://localhost:3000/", "42");
        assert_eq!(api.collection_path(CollectionName::Boats), "/api/boats");
        assert_eq!(
            api.collection_path(CollectionName::Bookings),
            "/api/bookings/user/42"
        );
        assert_eq!(
            api.collection_path(CollectionName::Messages),
            "/api/messages/user/42"
        );
        assert_eq!(api.url("/api/boats"), "http://localhost:3000/api/boats");
    }

    #[test]
    fn bad_token_is_rejected() {
        let mut config = Config::new("http://localhost:3000", "42");
        config.auth_token = Some("line\nbreak".to_string());
        assert!(HttpApi::from_config(&config).is_err());
    }
}
