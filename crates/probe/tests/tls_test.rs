//! Mutual TLS probes against an in-process HTTPS peer
//!
//! Each test mints its own CA and leaf certificates. The peer only accepts
//! clients holding a certificate signed by its CA.

use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use probe::{HttpsProber, ProbeStatus, ProbeTarget, Prober, TlsIdentity};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, SanType,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// A CA with one server and one client certificate it signs
struct TestPki {
    ca: Certificate,
    server: Certificate,
    client: Certificate,
}

fn keypair(common_name: &str, subject_alt_names: Vec<SanType>, is_ca: bool) -> Certificate {
    let mut params = CertificateParams::new(vec![]);
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    params.subject_alt_names = subject_alt_names;
    if is_ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    Certificate::from_params(params).expect("failed to generate keys")
}

impl TestPki {
    fn new(name: &str) -> Self {
        let loopback = SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Self {
            ca: keypair(&format!("{name} root"), vec![], true),
            server: keypair(&format!("{name} peer"), vec![loopback], false),
            client: keypair(&format!("{name} node"), vec![], false),
        }
    }

    fn ca_pem(&self) -> String {
        self.ca.serialize_pem().expect("failed to serialize root cert")
    }

    fn client_cert_pem(&self) -> String {
        self.client
            .serialize_pem_with_signer(&self.ca)
            .expect("failed to serialize client cert")
    }

    /// Client identity issued by this CA, trusting the root of `trusted`
    fn client_identity(&self, trusted: &TestPki) -> TlsIdentity {
        TlsIdentity::from_pem(
            self.client_cert_pem().as_bytes(),
            self.client.serialize_private_key_pem().as_bytes(),
            vec![trusted.ca_pem().into_bytes()],
        )
    }

    /// Server side: present the peer certificate, require a client certificate
    fn server_config(&self) -> Arc<ServerConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots
            .add(CertificateDer::from(self.ca.serialize_der().unwrap()))
            .unwrap();
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .unwrap();

        let chain = vec![CertificateDer::from(
            self.server.serialize_der_with_signer(&self.ca).unwrap(),
        )];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            self.server.serialize_private_key_der(),
        ));

        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_client_cert_verifier(verifier)
            .with_single_cert(chain, key)
            .unwrap();
        Arc::new(config)
    }
}

async fn spawn_https_peer(pki: &TestPki) -> SocketAddr {
    let app = Router::new().route("/health", get(|| async { "OK" }));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let config = RustlsConfig::from_config(pki.server_config());

    tokio::spawn(async move {
        axum_server::from_tcp_rustls(listener, config)
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn prober(addr: SocketAddr, tls: TlsIdentity) -> HttpsProber {
    let target = ProbeTarget::new(format!("https://{addr}/health"))
        .with_expected_body("OK")
        .with_timeout(Duration::from_secs(2))
        .with_tls(tls);
    HttpsProber::new(target).unwrap()
}

#[tokio::test]
async fn test_mutual_tls_probe_is_up() {
    let pki = TestPki::new("site-a");
    let addr = spawn_https_peer(&pki).await;

    let result = prober(addr, pki.client_identity(&pki)).check().await;
    assert_eq!(result.status, ProbeStatus::Healthy);
    assert_eq!(result.response_code, Some(200));
}

#[tokio::test]
async fn test_identity_loaded_from_files() {
    let pki = TestPki::new("site-a");
    let addr = spawn_https_peer(&pki).await;

    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("client.crt");
    let key = dir.path().join("client.key");
    let ca = dir.path().join("ca.crt");
    std::fs::write(&cert, pki.client_cert_pem()).unwrap();
    std::fs::write(&key, pki.client.serialize_private_key_pem()).unwrap();
    std::fs::write(&ca, pki.ca_pem()).unwrap();

    let identity = TlsIdentity::load(&cert, &key, Some(&ca)).unwrap();
    assert!(prober(addr, identity).probe().await);
}

#[tokio::test]
async fn test_untrusted_server_certificate_is_down() {
    let pki = TestPki::new("site-a");
    let other = TestPki::new("site-b");
    let addr = spawn_https_peer(&pki).await;

    // Valid client certificate, but the peer's root is not trusted
    let result = prober(addr, pki.client_identity(&other)).check().await;
    assert_eq!(result.status, ProbeStatus::Error);
}

#[tokio::test]
async fn test_client_certificate_from_foreign_ca_is_rejected() {
    let pki = TestPki::new("site-a");
    let other = TestPki::new("site-b");
    let addr = spawn_https_peer(&pki).await;

    assert!(!prober(addr, other.client_identity(&pki)).probe().await);
}
