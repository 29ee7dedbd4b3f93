//! Minimal JSON-over-HTTP fetch helper.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::DbAccessError;

/// Fetch a JSON document and decode it.
#[async_trait]
pub trait HttpRequests: Send + Sync {
    /// One GET, decoded as `T`. No retries.
    ///
    /// # Errors
    /// Returns [`DbAccessError::HttpError`] if the request fails, the server
    /// answers with a non-success status, or the body does not decode as `T`.
    async fn get_json<T>(&self, url: &str) -> Result<T, DbAccessError>
    where
        T: DeserializeOwned + Send + 'static;
}

/// [`HttpRequests`] over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpRequests {
    client: reqwest::Client,
}

impl ReqwestHttpRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpRequests for ReqwestHttpRequests {
    async fn get_json<T>(&self, url: &str) -> Result<T, DbAccessError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        tracing::debug!(url, "fetching json");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}
