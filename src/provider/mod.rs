//! Provider Gateway: the client abstraction over the remote block-storage API.
//!
//! [`BlockStorageProvider`] is the seam between the Controller service and the
//! provider.  The production implementation is [`http::HttpProviderGateway`];
//! tests substitute in-memory fakes.
//!
//! Attach and detach are asynchronous on the provider side: submitting an
//! attach returns an [`AttachAction`] whose status transitions are owned by
//! the provider and only ever observed, never mutated, from here.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced by a provider gateway call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's API answered with a non-success status.
    #[error("provider API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the provider's response body.
        message: String,
    },

    /// The request never produced a usable response.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The response body could not be decoded.
    #[error("decoding provider response: {0}")]
    Decode(String),
}

/// Parameters for provisioning a volume at the provider.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeCreateRequest {
    /// Caller-assigned display name, unique per request.
    pub name: String,
    /// Region in which to provision.
    pub region: String,
    /// Size in whole gigabytes.
    pub size_gigabytes: u64,
}

/// A volume record as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderVolume {
    /// Provider-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Region the volume lives in.
    #[serde(default)]
    pub region: String,
    /// Size in whole gigabytes.
    #[serde(default)]
    pub size_gigabytes: u64,
}

/// Status of an asynchronous provider action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    /// Submitted, not yet started.
    Pending,
    /// Running on the provider side.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Failed on the provider side.
    Errored,
}

/// An asynchronous attach/detach action, observed via polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachAction {
    /// Provider-assigned action identifier.
    pub id: i64,
    /// Current status.
    pub status: ActionStatus,
    /// When the provider accepted the action (RFC 3339), if reported.
    #[serde(default)]
    pub started_at: Option<String>,
}

/// Stateless client over the remote block-storage API.
#[async_trait]
pub trait BlockStorageProvider: Send + Sync {
    /// Provision a new volume.
    async fn create_volume(&self, req: &VolumeCreateRequest)
    -> Result<ProviderVolume, ProviderError>;

    /// Fetch a volume by id.
    async fn get_volume(&self, volume_id: &str) -> Result<ProviderVolume, ProviderError>;

    /// Submit an attach action binding the volume to the given node.
    async fn attach_volume(
        &self,
        volume_id: &str,
        droplet_id: u64,
    ) -> Result<AttachAction, ProviderError>;

    /// Observe the current status of an action.
    async fn get_action(
        &self,
        volume_id: &str,
        action_id: i64,
    ) -> Result<AttachAction, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_status_wire_names() {
        assert_eq!(
            serde_json::from_str::<ActionStatus>("\"in-progress\"").unwrap(),
            ActionStatus::InProgress
        );
        assert_eq!(
            serde_json::from_str::<ActionStatus>("\"completed\"").unwrap(),
            ActionStatus::Completed
        );
        assert_eq!(
            serde_json::to_string(&ActionStatus::Errored).unwrap(),
            "\"errored\""
        );
    }

    #[test]
    fn provider_volume_tolerates_missing_fields() {
        let vol: ProviderVolume =
            serde_json::from_str(r#"{"id":"v1","name":"vol-a"}"#).expect("deserialize");
        assert_eq!(vol.id, "v1");
        assert_eq!(vol.size_gigabytes, 0);
    }
}
