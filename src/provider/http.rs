//! HTTP implementation of [`BlockStorageProvider`] against a
//! DigitalOcean-compatible v2 block-storage API.
//!
//! Endpoints used:
//!
//! - `POST /v2/volumes` — provision
//! - `GET  /v2/volumes/{id}` — fetch
//! - `POST /v2/volumes/{id}/actions` — submit attach
//! - `GET  /v2/volumes/{id}/actions/{action_id}` — poll action status
//!
//! All requests carry a bearer token.  The base URL is overridable so tests
//! and private deployments can point the gateway elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    AttachAction, BlockStorageProvider, ProviderError, ProviderVolume, VolumeCreateRequest,
};

/// Default public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com";

/// Timeout applied to every individual API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VolumeEnvelope {
    volume: ProviderVolume,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: AttachAction,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct AttachBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    droplet_id: u64,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Stateless HTTP gateway to the provider's block-storage API.
pub struct HttpProviderGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpProviderGateway {
    /// Create a gateway against [`DEFAULT_API_BASE`].
    pub fn new(token: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Create a gateway against a custom API endpoint.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a response into `T`, mapping non-success statuses to
    /// [`ProviderError::Api`] with the provider's own message.
    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorBody>().await {
                Ok(body) if !body.message.is_empty() => body.message,
                _ => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_owned(),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BlockStorageProvider for HttpProviderGateway {
    #[instrument(skip(self), fields(name = %req.name, size_gb = req.size_gigabytes))]
    async fn create_volume(
        &self,
        req: &VolumeCreateRequest,
    ) -> Result<ProviderVolume, ProviderError> {
        let resp = self
            .client
            .post(self.url("/v2/volumes"))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let env: VolumeEnvelope = Self::decode(resp).await?;
        debug!(volume_id = %env.volume.id, "volume provisioned");
        Ok(env.volume)
    }

    #[instrument(skip(self))]
    async fn get_volume(&self, volume_id: &str) -> Result<ProviderVolume, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("/v2/volumes/{volume_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let env: VolumeEnvelope = Self::decode(resp).await?;
        Ok(env.volume)
    }

    #[instrument(skip(self))]
    async fn attach_volume(
        &self,
        volume_id: &str,
        droplet_id: u64,
    ) -> Result<AttachAction, ProviderError> {
        let body = AttachBody {
            kind: "attach",
            droplet_id,
        };
        let resp = self
            .client
            .post(self.url(&format!("/v2/volumes/{volume_id}/actions")))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let env: ActionEnvelope = Self::decode(resp).await?;
        debug!(action_id = env.action.id, status = ?env.action.status, "attach submitted");
        Ok(env.action)
    }

    async fn get_action(
        &self,
        volume_id: &str,
        action_id: i64,
    ) -> Result<AttachAction, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("/v2/volumes/{volume_id}/actions/{action_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let env: ActionEnvelope = Self::decode(resp).await?;
        Ok(env.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ActionStatus;

    #[test]
    fn volume_envelope_decodes() {
        let json = r#"{"volume":{"id":"v1","name":"vol-a","region":"ams3","size_gigabytes":5}}"#;
        let env: VolumeEnvelope = serde_json::from_str(json).expect("deserialize");
        assert_eq!(env.volume.id, "v1");
        assert_eq!(env.volume.size_gigabytes, 5);
    }

    #[test]
    fn action_envelope_decodes() {
        let json = r#"{"action":{"id":42,"status":"in-progress","started_at":"2020-01-01T00:00:00Z"}}"#;
        let env: ActionEnvelope = serde_json::from_str(json).expect("deserialize");
        assert_eq!(env.action.id, 42);
        assert_eq!(env.action.status, ActionStatus::InProgress);
    }

    #[test]
    fn attach_body_shape() {
        let body = AttachBody {
            kind: "attach",
            droplet_id: 7,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["type"], "attach");
        assert_eq!(json["droplet_id"], 7);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let gw = HttpProviderGateway::with_base_url("t", "http://localhost:8080/").unwrap();
        assert_eq!(gw.url("/v2/volumes"), "http://localhost:8080/v2/volumes");
    }
}
