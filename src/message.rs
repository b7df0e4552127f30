//! CSI protocol messages transmitted over QUIC.
//!
//! [`CsiMessage`] is the top-level envelope for all request and response
//! variants exchanged between the orchestrator-facing client and the plugin
//! server via QUIC bi-directional streams.  Every RPC of the contract has a
//! request variant, including the ones that currently answer
//! [`CsiError::Unimplemented`].

use serde::{Deserialize, Serialize};

use crate::error::CsiError;
use crate::types::*;

/// Top-level message envelope for CSI over QUIC.
///
/// Each QUIC bi-stream carries exactly one request followed by one response.
/// The client sends a *request* variant and the server replies with the
/// corresponding *response* variant (or [`CsiMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CsiMessage {
    // ----- Identity requests -----------------------------------------------
    /// Query plugin info.
    GetPluginInfo,
    /// Query plugin capabilities.
    GetPluginCapabilities,
    /// Readiness probe.
    Probe,

    // ----- Controller requests ---------------------------------------------
    /// Provision a new volume.
    CreateVolume(CreateVolumeRequest),
    /// Delete a volume.
    DeleteVolume(VolumeId),
    /// Attach a volume to a node.
    ControllerPublishVolume(ControllerPublishVolumeRequest),
    /// Detach a volume from a node.
    ControllerUnpublishVolume {
        volume_id: VolumeId,
        node_id: String,
    },
    /// Validate volume capabilities.
    ValidateVolumeCapabilities {
        volume_id: VolumeId,
        capabilities: Vec<VolumeCapability>,
    },
    /// List all volumes.
    ListVolumes,
    /// Query remaining capacity.
    GetCapacity,
    /// Query Controller service capabilities.
    ControllerGetCapabilities,
    /// Snapshot a volume.
    CreateSnapshot {
        source_volume_id: VolumeId,
        name: String,
    },
    /// Delete a snapshot.
    DeleteSnapshot { snapshot_id: String },
    /// List snapshots.
    ListSnapshots,
    /// Grow a volume.
    ControllerExpandVolume {
        volume_id: VolumeId,
        required_bytes: u64,
    },
    /// Fetch a single volume.
    ControllerGetVolume(VolumeId),

    // ----- Node requests ---------------------------------------------------
    /// Stage (format and mount) an attached volume.
    NodeStageVolume(NodeStageVolumeRequest),
    /// Unstage a previously staged volume.
    NodeUnstageVolume {
        volume_id: VolumeId,
        staging_target_path: String,
    },
    /// Publish (bind-mount) a staged volume.
    NodePublishVolume(NodePublishVolumeRequest),
    /// Unpublish a previously published volume.
    NodeUnpublishVolume {
        volume_id: VolumeId,
        target_path: String,
    },
    /// Report usage statistics for a volume.
    NodeGetVolumeStats {
        volume_id: VolumeId,
        volume_path: String,
    },
    /// Grow the filesystem on a node.
    NodeExpandVolume {
        volume_id: VolumeId,
        volume_path: String,
        required_bytes: u64,
    },
    /// Query Node service capabilities.
    NodeGetCapabilities,
    /// Query node info.
    NodeGetInfo,

    // ----- Responses -------------------------------------------------------
    /// A volume was successfully provisioned.
    VolumeCreated(CreatedVolume),
    /// Publish context produced by a completed attach.
    PublishContextResponse(PublishContext),
    /// A list of volumes.
    VolumeList(Vec<CreatedVolume>),
    /// Available capacity in bytes.
    Capacity(u64),
    /// Whether the requested capabilities are valid.
    CapabilitiesValid(bool),
    /// Controller service capabilities.
    ControllerCapabilitiesResponse(Vec<ControllerCapability>),
    /// Node service capabilities.
    NodeCapabilitiesResponse(Vec<NodeCapability>),
    /// Node information.
    NodeInfoResponse(NodeInfo),
    /// Plugin information.
    PluginInfoResponse(PluginInfo),
    /// Plugin capabilities.
    PluginCapabilitiesResponse(Vec<PluginCapability>),
    /// Probe result.
    ProbeResult(bool),
    /// Expanded capacity in bytes.
    ExpandedCapacity(u64),

    /// Generic success acknowledgement (no payload).
    Ok,
    /// An error occurred.
    Error(CsiError),
}

impl std::fmt::Display for CsiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetPluginInfo => f.write_str("GetPluginInfo"),
            Self::GetPluginCapabilities => f.write_str("GetPluginCapabilities"),
            Self::Probe => f.write_str("Probe"),
            Self::CreateVolume(req) => write!(f, "CreateVolume(name={})", req.name),
            Self::DeleteVolume(id) => write!(f, "DeleteVolume({id})"),
            Self::ControllerPublishVolume(req) => {
                write!(
                    f,
                    "ControllerPublishVolume({} -> node {})",
                    req.volume_id, req.node_id
                )
            }
            Self::ControllerUnpublishVolume { volume_id, .. } => {
                write!(f, "ControllerUnpublishVolume({volume_id})")
            }
            Self::ValidateVolumeCapabilities { volume_id, .. } => {
                write!(f, "ValidateVolumeCapabilities({volume_id})")
            }
            Self::ListVolumes => f.write_str("ListVolumes"),
            Self::GetCapacity => f.write_str("GetCapacity"),
            Self::ControllerGetCapabilities => f.write_str("ControllerGetCapabilities"),
            Self::CreateSnapshot {
                source_volume_id, ..
            } => write!(f, "CreateSnapshot({source_volume_id})"),
            Self::DeleteSnapshot { snapshot_id } => write!(f, "DeleteSnapshot({snapshot_id})"),
            Self::ListSnapshots => f.write_str("ListSnapshots"),
            Self::ControllerExpandVolume { volume_id, .. } => {
                write!(f, "ControllerExpandVolume({volume_id})")
            }
            Self::ControllerGetVolume(id) => write!(f, "ControllerGetVolume({id})"),
            Self::NodeStageVolume(req) => write!(f, "NodeStageVolume({})", req.volume_id),
            Self::NodeUnstageVolume { volume_id, .. } => {
                write!(f, "NodeUnstageVolume({volume_id})")
            }
            Self::NodePublishVolume(req) => write!(f, "NodePublishVolume({})", req.volume_id),
            Self::NodeUnpublishVolume { volume_id, .. } => {
                write!(f, "NodeUnpublishVolume({volume_id})")
            }
            Self::NodeGetVolumeStats { volume_id, .. } => {
                write!(f, "NodeGetVolumeStats({volume_id})")
            }
            Self::NodeExpandVolume { volume_id, .. } => {
                write!(f, "NodeExpandVolume({volume_id})")
            }
            Self::NodeGetCapabilities => f.write_str("NodeGetCapabilities"),
            Self::NodeGetInfo => f.write_str("NodeGetInfo"),
            Self::VolumeCreated(vol) => write!(f, "VolumeCreated({})", vol.volume_id),
            Self::PublishContextResponse(ctx) => {
                write!(f, "PublishContext(entries={})", ctx.len())
            }
            Self::VolumeList(vols) => write!(f, "VolumeList(count={})", vols.len()),
            Self::Capacity(c) => write!(f, "Capacity({c})"),
            Self::CapabilitiesValid(v) => write!(f, "CapabilitiesValid({v})"),
            Self::ControllerCapabilitiesResponse(caps) => {
                write!(f, "ControllerCapabilities(count={})", caps.len())
            }
            Self::NodeCapabilitiesResponse(caps) => {
                write!(f, "NodeCapabilities(count={})", caps.len())
            }
            Self::NodeInfoResponse(info) => write!(f, "NodeInfo({})", info.node_id),
            Self::PluginInfoResponse(info) => write!(f, "PluginInfo(name={})", info.name),
            Self::PluginCapabilitiesResponse(caps) => {
                write!(f, "PluginCapabilities(count={})", caps.len())
            }
            Self::ProbeResult(ok) => write!(f, "ProbeResult({ok})"),
            Self::ExpandedCapacity(c) => write!(f, "ExpandedCapacity({c})"),
            Self::Ok => f.write_str("Ok"),
            Self::Error(e) => write!(f, "Error({e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serde_roundtrip() {
        let msg = CsiMessage::CreateVolume(CreateVolumeRequest {
            name: "test".into(),
            required_bytes: 5 * GIGABYTE,
            volume_capabilities: vec![VolumeCapability::default()],
        });
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: CsiMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(de, CsiMessage::CreateVolume(_)));
    }

    #[test]
    fn error_message_roundtrip() {
        let msg = CsiMessage::Error(CsiError::unimplemented("DeleteVolume"));
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: CsiMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(de, CsiMessage::Error(CsiError::Unimplemented(_))));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(CsiMessage::Ok.to_string(), "Ok");
        assert_eq!(CsiMessage::Probe.to_string(), "Probe");
        assert_eq!(
            CsiMessage::DeleteVolume("v1".into()).to_string(),
            "DeleteVolume(v1)"
        );
    }
}
