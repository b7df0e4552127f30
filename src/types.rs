//! Core CSI types: volumes, capabilities, requests, and topology.
//!
//! These types form the data model shared by the CSI traits, the transport
//! layer, and the [`Driver`](crate::driver::Driver).  They are all
//! [`Serialize`]/[`Deserialize`] so they can be transmitted over QUIC as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default plugin name advertised via `GetPluginInfo`.
pub const DEFAULT_PLUGIN_NAME: &str = "blockcsi.storage.dev";

/// Publish-context key under which `ControllerPublishVolume` records the
/// provider-side volume name.  `NodeStageVolume` reads it back to derive the
/// local raw device path.
pub const VOLUME_NAME_CONTEXT_KEY: &str = "blockcsi.storage.dev/volume-name";

/// Filesystem type used when a mount capability does not name one.
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// One gigabyte, the provider's allocation granularity.
pub const GIGABYTE: u64 = 1 << 30;

// ---------------------------------------------------------------------------
// Volume identity
// ---------------------------------------------------------------------------

/// Opaque, provider-assigned identifier for a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// True when the identifier is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    /// Single-node read-write.
    ReadWriteOnce,
    /// Multi-node read-only.
    ReadOnlyMany,
    /// Multi-node read-write.
    ReadWriteMany,
}

/// How the workload consumes the volume: as a raw block device or through a
/// mounted filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessType {
    /// Raw block device, exposed directly at publish time; staging is a no-op.
    Block,
    /// Filesystem access: the device is formatted and mounted during staging.
    Mount {
        /// Filesystem type; [`DEFAULT_FS_TYPE`] when absent.
        #[serde(default)]
        fs_type: Option<String>,
        /// Additional mount flags (e.g. `"noatime"`).
        #[serde(default)]
        mount_flags: Vec<String>,
    },
}

/// Describes the capabilities required from a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCapability {
    /// Requested access mode.
    pub access_mode: AccessMode,
    /// Requested access type.
    pub access_type: AccessType,
}

impl VolumeCapability {
    /// Filesystem type to use for mount-type capabilities, falling back to
    /// [`DEFAULT_FS_TYPE`].  Block-type capabilities have no filesystem.
    pub fn resolved_fs_type(&self) -> &str {
        match &self.access_type {
            AccessType::Mount {
                fs_type: Some(fs), ..
            } if !fs.is_empty() => fs,
            _ => DEFAULT_FS_TYPE,
        }
    }

    /// Mount flags for mount-type capabilities; empty for block.
    pub fn mount_flags(&self) -> &[String] {
        match &self.access_type {
            AccessType::Mount { mount_flags, .. } => mount_flags,
            AccessType::Block => &[],
        }
    }
}

impl Default for VolumeCapability {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::ReadWriteOnce,
            access_type: AccessType::Mount {
                fs_type: None,
                mount_flags: Vec::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Publish context
// ---------------------------------------------------------------------------

/// Opaque key-value data produced by `ControllerPublishVolume` and threaded,
/// unmodified, through every subsequent node-side call for the same volume.
pub type PublishContext = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Provisioning result
// ---------------------------------------------------------------------------

/// Result of a successful `CreateVolume` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedVolume {
    /// Provider-assigned volume identifier.
    pub volume_id: VolumeId,
    /// Capacity actually granted, in bytes.  Recomputed from the whole
    /// gigabyte count submitted to the provider, so it is never less than
    /// the requested size.
    pub capacity_bytes: u64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to provision a new volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Caller-assigned display name, unique per create request.
    pub name: String,
    /// Minimum capacity in bytes.  Rounded up to whole gigabytes before
    /// submission to the provider.
    pub required_bytes: u64,
    /// Required capabilities; must contain at least one entry.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
}

/// Request to attach a volume to a compute node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerPublishVolumeRequest {
    /// Volume to attach.
    pub volume_id: VolumeId,
    /// Provider-assigned identifier of the target node.
    pub node_id: String,
    /// Whether the volume will be consumed read-only.
    #[serde(default)]
    pub read_only: bool,
    /// Capability the caller intends to use.
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
}

/// Request to stage (format and globally mount) an attached volume on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStageVolumeRequest {
    /// Volume to stage.
    pub volume_id: VolumeId,
    /// Node-local directory where the device is first mounted,
    /// e.g. `/var/lib/blockcsi/volumes/<vol-id>/globalmount`.
    pub staging_target_path: String,
    /// Requested capability.  Absence is a caller error.
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    /// Context produced by `ControllerPublishVolume`.
    #[serde(default)]
    pub publish_context: PublishContext,
}

/// Request to publish (bind-mount) a staged volume at a workload path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePublishVolumeRequest {
    /// Volume to publish.
    pub volume_id: VolumeId,
    /// The staging mount point (source of the bind mount).
    pub staging_target_path: String,
    /// Workload-specific target path,
    /// e.g. `/var/lib/blockcsi/pods/<pod-uid>/volumes/<vol-name>`.
    pub target_path: String,
    /// Requested capability.
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    /// Whether the bind mount should be read-only.
    #[serde(default)]
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// Plugin, service, and node info
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"blockcsi.storage.dev"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
}

/// Capabilities advertised by the plugin as a whole.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PluginCapability {
    /// Plugin provides a Controller service.
    ControllerService,
}

/// Capabilities advertised by the Controller service.  Callers branch their
/// call sequence on these (e.g. only issue `ControllerPublishVolume` when
/// publish/unpublish is advertised).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControllerCapability {
    /// `CreateVolume` / `DeleteVolume` are supported.
    CreateDeleteVolume,
    /// `ControllerPublishVolume` / `ControllerUnpublishVolume` are supported.
    PublishUnpublishVolume,
}

/// Capabilities advertised by the Node service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeCapability {
    /// `NodeStageVolume` / `NodeUnstageVolume` are supported.
    StageUnstageVolume,
}

/// Topology constraint expressed as key-value segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Topology segments, e.g. `{"region": "ams3"}`.
    #[serde(default)]
    pub segments: HashMap<String, String>,
}

/// Information about the node on which the CSI Node service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Provider-assigned numeric node identifier, rendered as a string.
    pub node_id: String,
    /// Maximum number of volumes the node can host.
    pub max_volumes_per_node: u64,
    /// Optional topology of this node.
    #[serde(default)]
    pub accessible_topology: Option<Topology>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_id_display() {
        let id = VolumeId("vol-abc".into());
        assert_eq!(id.to_string(), "vol-abc");
    }

    #[test]
    fn default_capability_is_mount_ext4() {
        let cap = VolumeCapability::default();
        assert_eq!(cap.access_mode, AccessMode::ReadWriteOnce);
        assert_eq!(cap.resolved_fs_type(), "ext4");
        assert!(cap.mount_flags().is_empty());
    }

    #[test]
    fn explicit_fs_type_wins_over_default() {
        let cap = VolumeCapability {
            access_mode: AccessMode::ReadWriteOnce,
            access_type: AccessType::Mount {
                fs_type: Some("xfs".into()),
                mount_flags: vec!["noatime".into()],
            },
        };
        assert_eq!(cap.resolved_fs_type(), "xfs");
        assert_eq!(cap.mount_flags(), ["noatime".to_owned()]);
    }

    #[test]
    fn empty_fs_type_falls_back_to_default() {
        let cap = VolumeCapability {
            access_mode: AccessMode::ReadWriteOnce,
            access_type: AccessType::Mount {
                fs_type: Some(String::new()),
                mount_flags: Vec::new(),
            },
        };
        assert_eq!(cap.resolved_fs_type(), "ext4");
    }

    #[test]
    fn stage_request_serde_defaults() {
        let json = r#"{"volume_id":"v1","staging_target_path":"/stage/v1"}"#;
        let req: NodeStageVolumeRequest = serde_json::from_str(json).expect("deserialize");
        assert!(req.volume_capability.is_none());
        assert!(req.publish_context.is_empty());
    }

    #[test]
    fn created_volume_serde_roundtrip() {
        let vol = CreatedVolume {
            volume_id: VolumeId("v1".into()),
            capacity_bytes: 5 * GIGABYTE,
        };
        let json = serde_json::to_string(&vol).expect("serialize");
        let de: CreatedVolume = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de, vol);
    }
}
