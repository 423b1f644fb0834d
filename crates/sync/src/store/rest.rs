/// REST adapter for a realtime-database style document store
///
/// `GET {base}/{path}.json` returns the stored JSON or `null` when nothing is
/// stored; `PUT {base}/{path}.json` replaces the value. An optional token is
/// passed as the `auth` query parameter.
use super::{CollectionStore, StorePath};
use crate::error::StoreError;
use async_trait::async_trait;
use movie_shelf_core::config::StoreConfig;
use movie_shelf_core::telemetry::store_op_span;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, Instrument};
use url::Url;

pub struct RestCollectionStore {
    base_url: Url,
    auth_token: Option<String>,
    http_client: Client,
}

impl RestCollectionStore {
    /// Create a store client for `base_url`
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid store URL: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "Store URL cannot be a base: {}",
                base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            auth_token,
            http_client,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::new(
            &config.url,
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    /// Full request URL for a document path
    fn document_url(&self, path: &StorePath) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::Unavailable(format!("Store URL cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty();

            let parts: Vec<&str> = path.segments().collect();
            if let Some((last, parents)) = parts.split_last() {
                segments.extend(parents);
                segments.push(&format!("{}.json", last));
            } else {
                segments.push(".json");
            }
        }

        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }

        Ok(url)
    }

    fn status_error(status: StatusCode, path: &StorePath) -> StoreError {
        StoreError::Status {
            status: status.as_u16(),
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl CollectionStore for RestCollectionStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let url = self.document_url(path)?;

        async {
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Self::status_error(status, path));
            }

            let value: Value = response.json().await.map_err(|e| StoreError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?;

            debug!(path = %path, found = !value.is_null(), "Store read completed");
            Ok(match value {
                Value::Null => None,
                value => Some(value),
            })
        }
        .instrument(store_op_span("GET", path.as_str()))
        .await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let url = self.document_url(path)?;
        let body =
            serde_json::to_vec(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        async {
            let response = self
                .http_client
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Self::status_error(status, path));
            }

            debug!(path = %path, "Store write completed");
            Ok(())
        }
        .instrument(store_op_span("PUT", path.as_str()))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url() {
        let store = RestCollectionStore::new(
            "https://movies.example.com/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store
            .document_url(&StorePath::new("users/42/reviews/550"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://movies.example.com/users/42/reviews/550.json"
        );
    }

    #[test]
    fn test_document_url_with_auth_and_prefix() {
        let store = RestCollectionStore::new(
            "https://movies.example.com/db",
            Some("tok en".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store
            .document_url(&StorePath::new("users/a b/favorites"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://movies.example.com/db/users/a%20b/favorites.json?auth=tok+en"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RestCollectionStore::new("not a url", None, Duration::from_secs(5)).is_err());
        assert!(RestCollectionStore::new("mailto:me@example.com", None, Duration::from_secs(5)).is_err());
    }
}
