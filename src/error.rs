//! CSI error types.
//!
//! All errors in the `libblockcsi` crate are represented by the [`CsiError`]
//! enum, which derives [`thiserror::Error`] for ergonomic error handling and
//! also implements [`Serialize`]/[`Deserialize`] so errors can travel across
//! the QUIC transport layer.
//!
//! Every variant maps onto one of three caller-visible classes via
//! [`CsiError::code`]: invalid-argument (fix the request), internal (decide
//! on retry), or unimplemented (the RPC carries no logic in this iteration).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-visible error class, used by orchestrators to pick a retry policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed or missing request fields; retrying unchanged will not help.
    InvalidArgument,
    /// Provider, tool, or plugin failure; the caller decides on retry.
    Internal,
    /// The RPC is not implemented; distinguishable from silent success.
    Unimplemented,
}

/// Unified error type for CSI operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum CsiError {
    /// The caller supplied an invalid or missing argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote block-storage provider rejected or failed a call.
    #[error("provider error: {0}")]
    Provider(String),

    /// An attach action did not reach `completed` before the deadline.
    #[error("volume {volume_id}: attach action {action_id} not completed after {waited_secs}s")]
    AttachTimeout {
        /// Volume being attached.
        volume_id: String,
        /// Provider-assigned action identifier.
        action_id: i64,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },

    /// Creating a filesystem on the raw device failed.
    #[error("creating filesystem on {device} failed: {output}")]
    FormatFailed {
        /// Device path passed to the mkfs tool.
        device: String,
        /// Combined output of the failed tool, verbatim.
        output: String,
    },

    /// A mount operation failed.
    #[error("mount failed at {path}: {output}")]
    MountFailed {
        /// Filesystem path where the mount was attempted.
        path: String,
        /// Combined output of the failed tool, verbatim.
        output: String,
    },

    /// The local node's identity could not be resolved.
    #[error("node metadata error: {0}")]
    NodeMetadata(String),

    /// A QUIC / transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The RPC carries no logic in this iteration.
    #[error("{0} is not implemented")]
    Unimplemented(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CsiError {
    /// Create a [`CsiError::Provider`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn provider<E: std::fmt::Display>(e: E) -> Self {
        Self::Provider(e.to_string())
    }

    /// Create a [`CsiError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Create a [`CsiError::Unimplemented`] for the named operation.
    pub fn unimplemented(op: &str) -> Self {
        Self::Unimplemented(op.to_owned())
    }

    /// The caller-visible class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Unimplemented(_) => ErrorCode::Unimplemented,
            Self::Provider(_)
            | Self::AttachTimeout { .. }
            | Self::FormatFailed { .. }
            | Self::MountFailed { .. }
            | Self::NodeMetadata(_)
            | Self::Transport(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CsiError::Unimplemented("DeleteVolume".into());
        assert_eq!(err.to_string(), "DeleteVolume is not implemented");
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            CsiError::InvalidArgument("name".into()).code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            CsiError::unimplemented("ListVolumes").code(),
            ErrorCode::Unimplemented
        );
        assert_eq!(
            CsiError::Provider("boom".into()).code(),
            ErrorCode::Internal
        );
        assert_eq!(
            CsiError::AttachTimeout {
                volume_id: "v1".into(),
                action_id: 42,
                waited_secs: 300,
            }
            .code(),
            ErrorCode::Internal
        );
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = CsiError::MountFailed {
            path: "/mnt/test".into(),
            output: "permission denied".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let de: CsiError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err.to_string(), de.to_string());
    }

    #[test]
    fn tool_output_preserved_verbatim() {
        let err = CsiError::FormatFailed {
            device: "/dev/sda".into(),
            output: "mke2fs 1.47.0: Device or resource busy".into(),
        };
        assert!(err.to_string().contains("Device or resource busy"));
    }
}
