//! # libblockcsi — CSI plugin for remote cloud block storage
//!
//! `libblockcsi` implements a [Container Storage Interface][csi] plugin for a
//! remote, DigitalOcean-compatible block-storage provider.  The controller
//! side provisions volumes and coordinates the provider's asynchronous attach
//! actions; the node side turns an attached raw device into a mounted
//! filesystem path via the host's `mkfs`/`mount` tools.  RPCs travel over
//! QUIC (via [`quinn`]) with Tokio async runtime, `tracing` for
//! observability, and `thiserror` for structured errors.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: volume ids, capabilities, requests, node info. |
//! | [`error`] | [`CsiError`] enum and the caller-visible error taxonomy. |
//! | [`message`] | [`CsiMessage`] protocol envelope for QUIC transport. |
//! | [`identity`] | [`CsiIdentity`] trait — plugin discovery & readiness. |
//! | [`controller`] | [`CsiController`] trait — provisioning & attachment. |
//! | [`node`] | [`CsiNode`] trait — staging & publishing. |
//! | [`provider`] | Gateway to the remote block-storage API. |
//! | [`mount`] | Format/mount executor wrapping the host's tools. |
//! | [`metadata`] | Resolver for the local node's provider identity. |
//! | [`driver`] | [`Driver`] — the concrete plugin implementation. |
//! | [`transport`] | QUIC client/server built on `quinn`. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod controller;
pub mod driver;
pub mod error;
pub mod identity;
pub mod message;
pub mod metadata;
pub mod mount;
pub mod node;
pub mod provider;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use controller::CsiController;
pub use driver::{Driver, DriverConfig};
pub use error::{CsiError, ErrorCode};
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use node::CsiNode;
pub use types::*;
