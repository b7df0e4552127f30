//! CSI Controller service trait.
//!
//! The Controller service manages the centralized volume lifecycle against the
//! remote block-storage provider: provisioning and attachment carry real
//! logic; the remaining operations are part of the RPC contract but return
//! [`CsiError::Unimplemented`] in this iteration so orchestrators never
//! mistake a no-op for a completed deletion or snapshot.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{
    ControllerCapability, ControllerPublishVolumeRequest, CreateVolumeRequest, CreatedVolume,
    PublishContext, VolumeCapability, VolumeId,
};

/// Controller service — centralized volume management.
///
/// Operations in this trait run on a management node and coordinate with the
/// provider to provision volumes and attach them to compute nodes.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a new volume.
    ///
    /// The returned [`CreatedVolume`] carries the provider-assigned id and the
    /// capacity actually granted (whole gigabytes, in bytes).
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreatedVolume, CsiError>;

    /// Delete a previously provisioned volume.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError>;

    /// Attach a volume to a compute node and wait for the provider's
    /// asynchronous attach action to complete.
    ///
    /// On success the returned [`PublishContext`] must be threaded, unmodified,
    /// to every subsequent node-side call for the same volume.
    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<PublishContext, CsiError>;

    /// Detach a volume from a compute node.
    async fn controller_unpublish_volume(
        &self,
        volume_id: &VolumeId,
        node_id: &str,
    ) -> Result<(), CsiError>;

    /// Check whether the given capabilities are compatible with the volume.
    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[VolumeCapability],
    ) -> Result<bool, CsiError>;

    /// List all volumes known to this controller.
    async fn list_volumes(&self) -> Result<Vec<CreatedVolume>, CsiError>;

    /// Return the total available capacity in bytes.
    async fn get_capacity(&self) -> Result<u64, CsiError>;

    /// Advertise the operations this Controller service supports.
    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, CsiError>;

    /// Snapshot the given volume.
    async fn create_snapshot(
        &self,
        source_volume_id: &VolumeId,
        name: &str,
    ) -> Result<(), CsiError>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), CsiError>;

    /// List snapshots.
    async fn list_snapshots(&self) -> Result<(), CsiError>;

    /// Grow a volume to at least `required_bytes`.
    async fn controller_expand_volume(
        &self,
        volume_id: &VolumeId,
        required_bytes: u64,
    ) -> Result<u64, CsiError>;

    /// Fetch a single volume by id.
    async fn controller_get_volume(&self, volume_id: &VolumeId)
    -> Result<CreatedVolume, CsiError>;
}
