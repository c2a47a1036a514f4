//! The two ways a connection is served: MBAP over plain TCP, or headerless
//! frames inside a TLS stream.

use crate::config::ServerConfig;
use crate::ServerError;
use async_trait::async_trait;
use modsim_core::frame::{FrameCodec, HeaderlessCodec, MbapCodec};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Codec: FrameCodec;
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Short name used in logs.
    const NAME: &'static str;

    fn codec(&self, config: &ServerConfig) -> Self::Codec;

    /// Turn an accepted socket into the stream a session reads from.
    async fn accept(&self, socket: TcpStream) -> Result<Self::Stream, ServerError>;
}

/// MBAP framing straight over the accepted socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTcp;

#[async_trait]
impl Transport for PlainTcp {
    type Codec = MbapCodec;
    type Stream = TcpStream;

    const NAME: &'static str = "tcp";

    fn codec(&self, config: &ServerConfig) -> Self::Codec {
        MbapCodec::new(config.unit_id)
    }

    async fn accept(&self, socket: TcpStream) -> Result<Self::Stream, ServerError> {
        Ok(socket)
    }
}

/// Headerless framing after a TLS handshake.
#[derive(Clone)]
pub struct TlsTransport {
    acceptor: TlsAcceptor,
}

impl TlsTransport {
    pub fn new(acceptor: TlsAcceptor) -> Self {
        Self { acceptor }
    }

    pub fn from_config(config: rustls::ServerConfig) -> Self {
        Self::new(TlsAcceptor::from(Arc::new(config)))
    }

    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, ServerError> {
        Ok(Self::from_config(load_tls_config(cert_path, key_path)?))
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for TlsTransport {
    type Codec = HeaderlessCodec;
    type Stream = TlsStream<TcpStream>;

    const NAME: &'static str = "tls";

    fn codec(&self, _config: &ServerConfig) -> Self::Codec {
        HeaderlessCodec
    }

    async fn accept(&self, socket: TcpStream) -> Result<Self::Stream, ServerError> {
        Ok(self.acceptor.accept(socket).await?)
    }
}

/// Build a server-side TLS configuration from a PEM certificate chain and a
/// PEM private key. Client certificates are not requested.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig, ServerError> {
    let certs = CertificateDer::pem_file_iter(cert_path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|err| {
            ServerError::Certificate(format!(
                "failed to read certificates from '{}': {err}",
                cert_path.display()
            ))
        })?;
    if certs.is_empty() {
        return Err(ServerError::Certificate(format!(
            "no certificates found in '{}'",
            cert_path.display()
        )));
    }

    let key = PrivateKeyDer::from_pem_file(key_path).map_err(|err| {
        ServerError::Certificate(format!(
            "failed to read private key from '{}': {err}",
            key_path.display()
        ))
    })?;

    tls_config_from_der(certs, key)
}

/// Same as [`load_tls_config`] for certificates already in DER form.
pub fn tls_config_from_der(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<rustls::ServerConfig, ServerError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}
