//! The block-storage CSI driver.
//!
//! [`Driver`] is the single concrete implementation of [`CsiIdentity`],
//! [`CsiController`], and [`CsiNode`].  Controller operations run on a
//! management node and talk to the provider through the
//! [`BlockStorageProvider`] gateway; node operations run on each compute node
//! and go through the [`Mounter`] and [`NodeMetadata`] seams.
//!
//! All durable volume and attachment state lives at the provider.  The only
//! in-process shared state is the readiness flag and a per-volume lock map
//! serializing stage/publish calls for the same volume; everything else is
//! call-scoped, so concurrent requests for different volumes never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::metadata::NodeMetadata;
use crate::mount::Mounter;
use crate::node::CsiNode;
use crate::provider::{ActionStatus, BlockStorageProvider, VolumeCreateRequest};
use crate::types::{
    AccessType, ControllerCapability, ControllerPublishVolumeRequest, CreateVolumeRequest,
    CreatedVolume, DEFAULT_PLUGIN_NAME, GIGABYTE, NodeCapability, NodeInfo,
    NodePublishVolumeRequest, NodeStageVolumeRequest, PluginCapability, PluginInfo, PublishContext,
    Topology, VOLUME_NAME_CONTEXT_KEY, VolumeCapability, VolumeId,
};

/// Volume limit reported by `NodeGetInfo`.
pub const MAX_VOLUMES_PER_NODE: u64 = 5;

/// Attached volumes appear under this prefix, suffixed with the volume's
/// display name.
const DEVICE_PATH_PREFIX: &str = "/dev/disk/by-id/scsi-0DO_Volume_";

/// Resolve the node-local raw device path for an attached volume from its
/// display name.
pub fn device_path_for_volume(volume_name: &str) -> String {
    format!("{DEVICE_PATH_PREFIX}{volume_name}")
}

/// Startup configuration for a [`Driver`] — no ambient globals.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Plugin name advertised via `GetPluginInfo`.
    pub name: String,
    /// Region in which volumes are provisioned.
    pub region: String,
    /// Interval between attach-action status polls.
    pub poll_interval: Duration,
    /// Deadline for an attach action to reach `completed`.
    pub attach_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLUGIN_NAME.to_owned(),
            region: "ams3".to_owned(),
            poll_interval: Duration::from_secs(1),
            attach_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// The CSI driver, serving identity, controller, and node operations.
pub struct Driver {
    config: DriverConfig,
    provider: Arc<dyn BlockStorageProvider>,
    mounter: Arc<dyn Mounter>,
    metadata: Arc<dyn NodeMetadata>,
    /// Flipped by the composition root once the transport is serving.
    ready: AtomicBool,
    /// Serializes stage/publish for the same volume.  Entries are created on
    /// first use and removed once no task holds them, so the map tracks only
    /// volumes with an operation in flight.
    volume_locks: DashMap<VolumeId, Arc<tokio::sync::Mutex<()>>>,
}

impl Driver {
    /// Create a driver from its configuration and collaborator seams.
    pub fn new(
        config: DriverConfig,
        provider: Arc<dyn BlockStorageProvider>,
        mounter: Arc<dyn Mounter>,
        metadata: Arc<dyn NodeMetadata>,
    ) -> Self {
        Self {
            config,
            provider,
            mounter,
            metadata,
            ready: AtomicBool::new(false),
            volume_locks: DashMap::new(),
        }
    }

    /// Mark the plugin ready (or not).  `Probe` reports this flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    fn volume_lock(&self, volume_id: &VolumeId) -> Arc<tokio::sync::Mutex<()>> {
        self.volume_locks
            .entry(volume_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop a volume's lock entry unless another task still holds a handle
    /// to it.  The strong count is checked under the map's shard lock, so a
    /// concurrent [`Self::volume_lock`] either clones the entry first (count
    /// above one, no removal) or re-creates it afterwards.
    fn release_volume_lock(&self, volume_id: &VolumeId) {
        self.volume_locks
            .remove_if(volume_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Poll the attach action until it is `completed` or the deadline elapses.
    ///
    /// A transient lookup failure counts as "not yet done" rather than
    /// aborting the wait; only the deadline ends it.  The loop holds no locks
    /// and is cancelled for free when the serving task's future is dropped.
    async fn wait_for_attach(&self, volume_id: &str, action_id: i64) -> Result<(), CsiError> {
        let deadline = Instant::now() + self.config.attach_timeout;
        loop {
            match self.provider.get_action(volume_id, action_id).await {
                Ok(action) if action.status == ActionStatus::Completed => {
                    debug!(volume_id, action_id, "attach action completed");
                    return Ok(());
                }
                Ok(action) => {
                    debug!(volume_id, action_id, status = ?action.status, "attach still pending");
                }
                Err(e) => {
                    warn!(volume_id, action_id, error = %e, "action lookup failed, will retry");
                }
            }
            if Instant::now() >= deadline {
                return Err(CsiError::AttachTimeout {
                    volume_id: volume_id.to_owned(),
                    action_id,
                    waited_secs: self.config.attach_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Format the attached device and mount it at the staging path.  The
    /// caller holds the volume's lock.
    async fn stage_device(
        &self,
        req: &NodeStageVolumeRequest,
        capability: &VolumeCapability,
        volume_name: &str,
    ) -> Result<(), CsiError> {
        let device = device_path_for_volume(volume_name);
        let fs_type = capability.resolved_fs_type();

        self.mounter
            .format_device(&device, fs_type)
            .await
            .map_err(|e| CsiError::FormatFailed {
                device: device.clone(),
                output: e.to_string(),
            })?;

        self.mounter
            .mount(
                &device,
                &req.staging_target_path,
                fs_type,
                capability.mount_flags(),
            )
            .await
            .map_err(|e| CsiError::MountFailed {
                path: req.staging_target_path.clone(),
                output: e.to_string(),
            })?;

        info!(
            volume_id = %req.volume_id,
            device,
            staging_target_path = %req.staging_target_path,
            fs_type,
            "volume staged",
        );
        Ok(())
    }

    /// Bind-mount the staging path onto the publish target.  The caller
    /// holds the volume's lock.
    async fn publish_bind_mount(&self, req: &NodePublishVolumeRequest) -> Result<(), CsiError> {
        let mut options = vec!["bind".to_owned()];
        if req.read_only {
            options.push("ro".to_owned());
        }
        let fs_type = req
            .volume_capability
            .as_ref()
            .map(VolumeCapability::resolved_fs_type)
            .unwrap_or(crate::types::DEFAULT_FS_TYPE);

        self.mounter
            .mount(&req.staging_target_path, &req.target_path, fs_type, &options)
            .await
            .map_err(|e| CsiError::MountFailed {
                path: req.target_path.clone(),
                output: e.to_string(),
            })?;

        info!(
            volume_id = %req.volume_id,
            target_path = %req.target_path,
            read_only = req.read_only,
            "volume published",
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CsiIdentity
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiIdentity for Driver {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(PluginInfo {
            name: self.config.name.clone(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(vec![PluginCapability::ControllerService])
    }

    async fn probe(&self) -> Result<bool, CsiError> {
        Ok(self.ready.load(Ordering::Acquire))
    }
}

// ---------------------------------------------------------------------------
// CsiController
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiController for Driver {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<CreatedVolume, CsiError> {
        // Validation happens before any provider call.
        if req.name.is_empty() {
            return Err(CsiError::InvalidArgument(
                "CreateVolume requires a non-empty name".into(),
            ));
        }
        if req.volume_capabilities.is_empty() {
            return Err(CsiError::InvalidArgument(
                "CreateVolume requires at least one volume capability".into(),
            ));
        }

        // Round up to the provider's whole-gigabyte granularity; the granted
        // capacity is never less than requested.
        let size_gigabytes = req.required_bytes.div_ceil(GIGABYTE);
        // The recomputed byte count must stay representable, otherwise the
        // capacity invariant would silently break on wraparound.
        let capacity_bytes = size_gigabytes.checked_mul(GIGABYTE).ok_or_else(|| {
            CsiError::InvalidArgument(format!(
                "requested capacity of {} bytes cannot be rounded to whole gigabytes",
                req.required_bytes
            ))
        })?;

        let vol = self
            .provider
            .create_volume(&VolumeCreateRequest {
                name: req.name.clone(),
                region: self.config.region.clone(),
                size_gigabytes,
            })
            .await
            .map_err(|e| CsiError::Provider(format!("provisioning volume {}: {e}", req.name)))?;

        info!(volume_id = %vol.id, size_gigabytes, "volume provisioned");
        Ok(CreatedVolume {
            volume_id: VolumeId(vol.id),
            capacity_bytes,
        })
    }

    async fn delete_volume(&self, _volume_id: &VolumeId) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("DeleteVolume"))
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id, node_id = %req.node_id))]
    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<PublishContext, CsiError> {
        if req.volume_id.is_empty() {
            return Err(CsiError::InvalidArgument(
                "ControllerPublishVolume requires a volume id".into(),
            ));
        }
        if req.node_id.is_empty() {
            return Err(CsiError::InvalidArgument(
                "ControllerPublishVolume requires a node id".into(),
            ));
        }

        // The caller created this volume earlier in the same workflow, so a
        // failed lookup means it has since become unavailable.
        let vol = self
            .provider
            .get_volume(&req.volume_id.0)
            .await
            .map_err(|e| {
                CsiError::Provider(format!("volume {} is no longer available: {e}", req.volume_id))
            })?;

        let droplet_id: u64 = req.node_id.parse().map_err(|_| {
            CsiError::Internal(format!(
                "node id {:?} is not a numeric droplet id",
                req.node_id
            ))
        })?;

        let action = self
            .provider
            .attach_volume(&req.volume_id.0, droplet_id)
            .await
            .map_err(|e| {
                CsiError::Provider(format!(
                    "attaching volume {} to node {droplet_id}: {e}",
                    req.volume_id
                ))
            })?;

        self.wait_for_attach(&req.volume_id.0, action.id).await?;

        info!(volume_id = %req.volume_id, droplet_id, "volume attached");
        // The node side resolves the device path from the display name,
        // sparing it a second round trip to the provider.
        Ok(HashMap::from([(
            VOLUME_NAME_CONTEXT_KEY.to_owned(),
            vol.name,
        )]))
    }

    async fn controller_unpublish_volume(
        &self,
        _volume_id: &VolumeId,
        _node_id: &str,
    ) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("ControllerUnpublishVolume"))
    }

    async fn validate_volume_capabilities(
        &self,
        _volume_id: &VolumeId,
        _capabilities: &[VolumeCapability],
    ) -> Result<bool, CsiError> {
        Err(CsiError::unimplemented("ValidateVolumeCapabilities"))
    }

    async fn list_volumes(&self) -> Result<Vec<CreatedVolume>, CsiError> {
        Err(CsiError::unimplemented("ListVolumes"))
    }

    async fn get_capacity(&self) -> Result<u64, CsiError> {
        Err(CsiError::unimplemented("GetCapacity"))
    }

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerCapability>, CsiError> {
        Ok(vec![
            ControllerCapability::CreateDeleteVolume,
            ControllerCapability::PublishUnpublishVolume,
        ])
    }

    async fn create_snapshot(
        &self,
        _source_volume_id: &VolumeId,
        _name: &str,
    ) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("CreateSnapshot"))
    }

    async fn delete_snapshot(&self, _snapshot_id: &str) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("DeleteSnapshot"))
    }

    async fn list_snapshots(&self) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("ListSnapshots"))
    }

    async fn controller_expand_volume(
        &self,
        _volume_id: &VolumeId,
        _required_bytes: u64,
    ) -> Result<u64, CsiError> {
        Err(CsiError::unimplemented("ControllerExpandVolume"))
    }

    async fn controller_get_volume(
        &self,
        _volume_id: &VolumeId,
    ) -> Result<CreatedVolume, CsiError> {
        Err(CsiError::unimplemented("ControllerGetVolume"))
    }
}

// ---------------------------------------------------------------------------
// CsiNode
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiNode for Driver {
    #[instrument(skip(self, req), fields(volume_id = %req.volume_id))]
    async fn node_stage_volume(&self, req: NodeStageVolumeRequest) -> Result<(), CsiError> {
        if req.volume_id.is_empty() {
            return Err(CsiError::InvalidArgument(
                "NodeStageVolume requires a volume id".into(),
            ));
        }
        if req.staging_target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "NodeStageVolume requires a staging target path".into(),
            ));
        }
        let Some(capability) = req.volume_capability.as_ref() else {
            return Err(CsiError::InvalidArgument(
                "NodeStageVolume requires a volume capability".into(),
            ));
        };

        // Raw-block volumes are exposed directly at publish time.
        if capability.access_type == AccessType::Block {
            debug!(volume_id = %req.volume_id, "block capability, staging is a no-op");
            return Ok(());
        }

        let Some(volume_name) = req.publish_context.get(VOLUME_NAME_CONTEXT_KEY) else {
            return Err(CsiError::InvalidArgument(format!(
                "publish context is missing the {VOLUME_NAME_CONTEXT_KEY} entry"
            )));
        };

        let lock = self.volume_lock(&req.volume_id);
        let guard = lock.lock().await;
        let result = self.stage_device(&req, capability, volume_name).await;
        drop(guard);
        drop(lock);
        self.release_volume_lock(&req.volume_id);
        result
    }

    async fn node_unstage_volume(
        &self,
        _volume_id: &VolumeId,
        _staging_target_path: &str,
    ) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("NodeUnstageVolume"))
    }

    #[instrument(skip(self, req), fields(volume_id = %req.volume_id))]
    async fn node_publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError> {
        if req.staging_target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "NodePublishVolume requires a staging target path".into(),
            ));
        }
        if req.target_path.is_empty() {
            return Err(CsiError::InvalidArgument(
                "NodePublishVolume requires a target path".into(),
            ));
        }

        let lock = self.volume_lock(&req.volume_id);
        let guard = lock.lock().await;
        let result = self.publish_bind_mount(&req).await;
        drop(guard);
        drop(lock);
        self.release_volume_lock(&req.volume_id);
        result
    }

    async fn node_unpublish_volume(
        &self,
        _volume_id: &VolumeId,
        _target_path: &str,
    ) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("NodeUnpublishVolume"))
    }

    async fn node_get_volume_stats(
        &self,
        _volume_id: &VolumeId,
        _volume_path: &str,
    ) -> Result<(), CsiError> {
        Err(CsiError::unimplemented("NodeGetVolumeStats"))
    }

    async fn node_expand_volume(
        &self,
        _volume_id: &VolumeId,
        _volume_path: &str,
        _required_bytes: u64,
    ) -> Result<u64, CsiError> {
        Err(CsiError::unimplemented("NodeExpandVolume"))
    }

    async fn node_get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError> {
        Ok(vec![NodeCapability::StageUnstageVolume])
    }

    async fn node_get_info(&self) -> Result<NodeInfo, CsiError> {
        let id = self
            .metadata
            .droplet_id()
            .await
            .map_err(|e| CsiError::NodeMetadata(e.to_string()))?;
        let region = self
            .metadata
            .region()
            .await
            .map_err(|e| CsiError::NodeMetadata(e.to_string()))?;

        Ok(NodeInfo {
            node_id: id.to_string(),
            max_volumes_per_node: MAX_VOLUMES_PER_NODE,
            accessible_topology: Some(Topology {
                segments: HashMap::from([("region".to_owned(), region)]),
            }),
        })
    }
}
