//! Client/server round trip over QUIC with a locally issued certificate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rcgen::{CertificateParams, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use libblockcsi::driver::{Driver, DriverConfig};
use libblockcsi::error::ErrorCode;
use libblockcsi::message::CsiMessage;
use libblockcsi::metadata::{MetadataError, NodeMetadata};
use libblockcsi::mount::{MountError, Mounter};
use libblockcsi::provider::{
    ActionStatus, AttachAction, BlockStorageProvider, ProviderError, ProviderVolume,
    VolumeCreateRequest,
};
use libblockcsi::transport::{CsiClient, CsiServer};
use libblockcsi::types::{
    CreateVolumeRequest, DEFAULT_PLUGIN_NAME, GIGABYTE, VolumeCapability, VolumeId,
};

const SERVER_NAME: &str = "localhost";

/// Self-signed certificate plus matching server/client TLS configs.
fn tls_pair() -> (rustls::ServerConfig, rustls::ClientConfig) {
    let key = KeyPair::generate().expect("generate key");
    let params = CertificateParams::new(vec![SERVER_NAME.to_owned()]).expect("cert params");
    let cert = params.self_signed(&key).expect("self-sign");
    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));

    let mut server = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .expect("server TLS config");
    server.alpn_protocols = vec![b"csi".to_vec()];

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).expect("trust certificate");
    let mut client = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    client.alpn_protocols = vec![b"csi".to_vec()];

    (server, client)
}

struct StubProvider;

#[async_trait]
impl BlockStorageProvider for StubProvider {
    async fn create_volume(
        &self,
        req: &VolumeCreateRequest,
    ) -> Result<ProviderVolume, ProviderError> {
        Ok(ProviderVolume {
            id: "v1".into(),
            name: req.name.clone(),
            region: req.region.clone(),
            size_gigabytes: req.size_gigabytes,
        })
    }

    async fn get_volume(&self, volume_id: &str) -> Result<ProviderVolume, ProviderError> {
        Ok(ProviderVolume {
            id: volume_id.to_owned(),
            name: "vol-a".into(),
            region: "ams3".into(),
            size_gigabytes: 1,
        })
    }

    async fn attach_volume(
        &self,
        _volume_id: &str,
        _droplet_id: u64,
    ) -> Result<AttachAction, ProviderError> {
        Ok(AttachAction {
            id: 1,
            status: ActionStatus::InProgress,
            started_at: None,
        })
    }

    async fn get_action(
        &self,
        _volume_id: &str,
        _action_id: i64,
    ) -> Result<AttachAction, ProviderError> {
        Ok(AttachAction {
            id: 1,
            status: ActionStatus::Completed,
            started_at: None,
        })
    }
}

struct StubMounter;

#[async_trait]
impl Mounter for StubMounter {
    async fn format_device(&self, _device: &str, _fs_type: &str) -> Result<(), MountError> {
        Ok(())
    }

    async fn mount(
        &self,
        _source: &str,
        _target: &str,
        _fs_type: &str,
        _options: &[String],
    ) -> Result<(), MountError> {
        Ok(())
    }
}

struct StubMetadata;

#[async_trait]
impl NodeMetadata for StubMetadata {
    async fn droplet_id(&self) -> Result<u64, MetadataError> {
        Ok(7)
    }

    async fn region(&self) -> Result<String, MetadataError> {
        Ok("ams3".into())
    }
}

#[tokio::test]
async fn request_round_trip_over_quic() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    let (server_tls, client_tls) = tls_pair();

    let driver = Arc::new(Driver::new(
        DriverConfig {
            poll_interval: Duration::from_millis(2),
            attach_timeout: Duration::from_millis(100),
            ..DriverConfig::default()
        },
        Arc::new(StubProvider),
        Arc::new(StubMounter),
        Arc::new(StubMetadata),
    ));
    driver.set_ready(true);

    let server = CsiServer::new("127.0.0.1:0".parse().unwrap(), server_tls, driver)
        .expect("start server");
    let addr = server.endpoint().local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let client = CsiClient::connect(addr, SERVER_NAME, client_tls)
        .await
        .expect("connect");

    let response = client.request(&CsiMessage::Probe).await.expect("probe");
    assert!(matches!(response, CsiMessage::ProbeResult(true)));

    let response = client
        .request(&CsiMessage::GetPluginInfo)
        .await
        .expect("plugin info");
    match response {
        CsiMessage::PluginInfoResponse(info) => assert_eq!(info.name, DEFAULT_PLUGIN_NAME),
        other => panic!("unexpected response: {other}"),
    }

    let response = client
        .request(&CsiMessage::CreateVolume(CreateVolumeRequest {
            name: "vol-a".into(),
            required_bytes: GIGABYTE,
            volume_capabilities: vec![VolumeCapability::default()],
        }))
        .await
        .expect("create volume");
    match response {
        CsiMessage::VolumeCreated(vol) => {
            assert_eq!(vol.volume_id, VolumeId("v1".into()));
            assert_eq!(vol.capacity_bytes, GIGABYTE);
        }
        other => panic!("unexpected response: {other}"),
    }

    // Stub operations come back as errors, not dropped streams.
    let response = client
        .request(&CsiMessage::DeleteVolume("v1".into()))
        .await
        .expect("delete volume");
    match response {
        CsiMessage::Error(err) => assert_eq!(err.code(), ErrorCode::Unimplemented),
        other => panic!("unexpected response: {other}"),
    }

    client.close();
}
