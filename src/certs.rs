//! Certificate expiry resolution.
//!
//! Two sources: PEM bytes stored in a TLS secret, and the leaf certificate a
//! host presents during a live handshake. Trust is never checked; only the
//! `notAfter` field matters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::ClientConfig;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;

use crate::errors::{CheckerError, Result};

/// Port probed for ingress hostnames.
pub const HTTPS_PORT: u16 = 443;

/// Budget for TCP connect plus TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// `notAfter` of the first PEM block in `pem`.
///
/// `origin` only feeds error messages (e.g. `secret default/web-tls`).
pub fn parse_cert_expiry(pem: &[u8], origin: &str) -> Result<DateTime<Utc>> {
    with_first_certificate(pem, origin, |cert| not_after(cert, origin))
}

/// First DNS SAN of the first certificate in `pem`, else its subject CN.
pub fn domain_from_cert(pem: &[u8], origin: &str) -> Result<String> {
    with_first_certificate(pem, origin, |cert| {
        let san = cert
            .subject_alternative_name()
            .map_err(|e| CheckerError::parse("certificate SAN", origin, e.to_string()))?;

        let from_san = san.and_then(|ext| {
            ext.value.general_names.iter().find_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
        });

        from_san
            .or_else(|| {
                cert.subject()
                    .iter_common_name()
                    .next()
                    .and_then(|cn| cn.as_str().ok())
                    .filter(|cn| !cn.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                CheckerError::parse("certificate", origin, "no domain names in certificate")
            })
    })
}

fn with_first_certificate<T>(
    pem: &[u8],
    origin: &str,
    f: impl FnOnce(&X509Certificate<'_>) -> Result<T>,
) -> Result<T> {
    let (_, block) =
        parse_x509_pem(pem).map_err(|e| CheckerError::decode(origin, e.to_string()))?;
    let cert = block
        .parse_x509()
        .map_err(|e| CheckerError::parse("certificate", origin, e.to_string()))?;
    f(&cert)
}

fn not_after(cert: &X509Certificate<'_>, origin: &str) -> Result<DateTime<Utc>> {
    let ts = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(ts, 0).ok_or_else(|| {
        CheckerError::parse("certificate validity", origin, format!("timestamp {ts} out of range"))
    })
}

/// Reads certificate expiry from a live host.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    async fn peer_expiry(&self, host: &str) -> Result<DateTime<Utc>>;
}

/// TLS probe that accepts any certificate chain.
pub struct TlsCertificateProbe {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl TlsCertificateProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_port(HTTPS_PORT, timeout)
    }

    pub fn with_port(port: u16, timeout: Duration) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| CheckerError::configuration(format!("TLS client setup: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            port,
            timeout,
        })
    }

    async fn handshake_leaf(&self, host: &str) -> Result<Vec<u8>> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| CheckerError::connect(host, format!("invalid server name: {e}")))?;

        let stream = TcpStream::connect((host, self.port))
            .await
            .map_err(|e| CheckerError::connect(host, e.to_string()))?;
        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| CheckerError::connect(host, e.to_string()))?;

        let (_, session) = tls.get_ref();
        session
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|leaf| leaf.as_ref().to_vec())
            .ok_or_else(|| CheckerError::NoCertificate {
                host: host.to_string(),
            })
    }
}

#[async_trait]
impl CertificateProbe for TlsCertificateProbe {
    async fn peer_expiry(&self, host: &str) -> Result<DateTime<Utc>> {
        let der = timeout(self.timeout, self.handshake_leaf(host))
            .await
            .map_err(|_| CheckerError::connect(host, format!("timed out after {:?}", self.timeout)))??;

        let (_, cert) = parse_x509_certificate(&der)
            .map_err(|e| CheckerError::parse("peer certificate", host, e.to_string()))?;
        not_after(&cert, host)
    }
}

/// Verifier that accepts every chain; only expiry is read from it.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
