//! CSI Node service trait.
//!
//! The Node service runs on each compute node and turns an attached raw block
//! device into a filesystem path usable by a workload:
//!
//! 1. **Stage** — create a filesystem on the attached device and mount it at
//!    the global staging path.
//! 2. **Publish** — bind-mount the staging path into the workload's target
//!    path.
//! 3. **Unpublish** / **Unstage** — the required inverses; unimplemented in
//!    this iteration and signalled as such.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{NodeCapability, NodeInfo, NodePublishVolumeRequest, NodeStageVolumeRequest, VolumeId};

/// Node service — local format / mount operations.
#[async_trait]
pub trait CsiNode: Send + Sync {
    /// Stage a volume: format the attached raw device and mount it at the
    /// staging path.  A no-op for raw-block capabilities.
    async fn node_stage_volume(&self, req: NodeStageVolumeRequest) -> Result<(), CsiError>;

    /// Unstage a volume: unmount the filesystem from the staging path.
    async fn node_unstage_volume(
        &self,
        volume_id: &VolumeId,
        staging_target_path: &str,
    ) -> Result<(), CsiError>;

    /// Publish a volume: bind-mount the staged path at the workload path.
    async fn node_publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError>;

    /// Unpublish a volume: remove the bind mount from the workload path.
    async fn node_unpublish_volume(
        &self,
        volume_id: &VolumeId,
        target_path: &str,
    ) -> Result<(), CsiError>;

    /// Report usage statistics for a published volume.
    async fn node_get_volume_stats(
        &self,
        volume_id: &VolumeId,
        volume_path: &str,
    ) -> Result<(), CsiError>;

    /// Grow the filesystem on a node after a controller-side expansion.
    async fn node_expand_volume(
        &self,
        volume_id: &VolumeId,
        volume_path: &str,
        required_bytes: u64,
    ) -> Result<u64, CsiError>;

    /// Advertise the operations this Node service supports.
    async fn node_get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError>;

    /// Return information about the node on which this service is running.
    async fn node_get_info(&self) -> Result<NodeInfo, CsiError>;
}
