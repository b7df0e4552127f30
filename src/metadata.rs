//! Node Identity Resolver: the local node's provider-assigned identity.
//!
//! On a provider-managed node the identity and topology are served by a
//! link-local metadata endpoint.  [`NodeMetadata`] abstracts that lookup so
//! the Node service can be tested without one.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Link-local metadata endpoint on provider-managed nodes.
pub const DEFAULT_METADATA_BASE: &str = "http://169.254.169.254";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Error produced by a metadata lookup.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The metadata endpoint was unreachable or answered non-success.
    #[error("metadata request failed: {0}")]
    Request(String),

    /// The endpoint answered with something other than the expected value.
    #[error("unexpected metadata value {value:?}: {reason}")]
    Malformed {
        /// The raw value returned.
        value: String,
        /// Why it could not be used.
        reason: String,
    },
}

/// Resolver for the local node's provider-assigned identity and topology.
#[async_trait]
pub trait NodeMetadata: Send + Sync {
    /// The numeric identifier the provider assigned to this node.
    async fn droplet_id(&self) -> Result<u64, MetadataError>;

    /// The region this node runs in.
    async fn region(&self) -> Result<String, MetadataError>;
}

/// Parse the plain-text body of the metadata id endpoint.
fn parse_droplet_id(body: &str) -> Result<u64, MetadataError> {
    body.trim()
        .parse::<u64>()
        .map_err(|e| MetadataError::Malformed {
            value: body.to_owned(),
            reason: e.to_string(),
        })
}

/// [`NodeMetadata`] implementation backed by the link-local metadata service.
pub struct HttpMetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataClient {
    /// Create a client against [`DEFAULT_METADATA_BASE`].
    pub fn new() -> Result<Self, MetadataError> {
        Self::with_base_url(DEFAULT_METADATA_BASE)
    }

    /// Create a client against a custom endpoint (tests, private deployments).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MetadataError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    async fn fetch(&self, path: &str) -> Result<String, MetadataError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(MetadataError::Request(format!(
                "{path} returned {}",
                resp.status()
            )));
        }
        resp.text()
            .await
            .map_err(|e| MetadataError::Request(e.to_string()))
    }
}

#[async_trait]
impl NodeMetadata for HttpMetadataClient {
    async fn droplet_id(&self) -> Result<u64, MetadataError> {
        let body = self.fetch("/metadata/v1/id").await?;
        parse_droplet_id(&body)
    }

    async fn region(&self) -> Result<String, MetadataError> {
        let body = self.fetch("/metadata/v1/region").await?;
        Ok(body.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn droplet_id_parses_with_trailing_newline() {
        assert_eq!(parse_droplet_id("12345\n").unwrap(), 12345);
    }

    #[test]
    fn droplet_id_rejects_garbage() {
        let err = parse_droplet_id("<html>not found</html>").unwrap_err();
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }
}
