//! Process-wide TLS client context.
//!
//! One verifying and one non-verifying `ClientConfig` exist per process.
//! Each is built on first use; later calls hand out the same `Arc`.

use std::sync::{Arc, OnceLock};

use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{
    CryptoProvider, ring, verify_tls12_signature, verify_tls13_signature,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
};
use tracing::{debug, warn};

use crate::error::ConnectionError;

static VERIFIED: OnceLock<Arc<ClientConfig>> = OnceLock::new();
static UNVERIFIED: OnceLock<Arc<ClientConfig>> = OnceLock::new();

/// Shared client config, created at most once per process for each mode.
pub fn client_config(verify: bool) -> Result<Arc<ClientConfig>, ConnectionError> {
    let cell = if verify { &VERIFIED } else { &UNVERIFIED };
    if let Some(config) = cell.get() {
        return Ok(Arc::clone(config));
    }

    let config = Arc::new(build_config(verify)?);
    debug!(verify, "TLS client context initialised");
    Ok(Arc::clone(cell.get_or_init(|| config)))
}

/// Validate `host` as a TLS server name (DNS name or IP literal).
pub fn server_name(host: &str) -> Result<ServerName<'static>, ConnectionError> {
    ServerName::try_from(host.to_owned())
        .map_err(|_| ConnectionError::InvalidServerName(host.to_owned()))
}

/// Run the client handshake over an established TCP stream.
pub async fn connect(
    tcp: TcpStream,
    host: &str,
    verify: bool,
) -> Result<TlsStream<TcpStream>, ConnectionError> {
    let config = client_config(verify)?;
    let name = server_name(host)?;
    TlsConnector::from(config)
        .connect(name, tcp)
        .await
        .map_err(ConnectionError::Tls)
}

fn build_config(verify: bool) -> Result<ClientConfig, ConnectionError> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectionError::TlsContext(e.to_string()))?;

    let config = if verify {
        builder
            .with_root_certificates(native_roots()?)
            .with_no_client_auth()
    } else {
        // Dangerous: Skip certificate verification (for testing/self-signed certs only)
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousNoVerifier { provider }))
            .with_no_client_auth()
    };
    Ok(config)
}

fn native_roots() -> Result<RootCertStore, ConnectionError> {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!(error = %e, "Failed to add root cert");
        }
    }
    for e in &certs.errors {
        warn!(error = %e, "Error loading native certs");
    }
    if roots.is_empty() {
        return Err(ConnectionError::TlsContext(
            "no usable system root certificates".to_string(),
        ));
    }
    Ok(roots)
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
pub struct DangerousNoVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for DangerousNoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
