//! Secure transport to a node's control RPC port.
//!
//! lnd serves its RPC interface with a self-signed certificate that is also
//! marked as a CA, which webpki refuses as an end-entity certificate. The
//! connector here pins the node's certificate instead: the server must present
//! exactly the certificates found in the configured PEM file.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tokio::fs;
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig, DigitallySignedStruct, Error as TlsError, SignatureScheme,
};
use tokio_rustls::TlsConnector;
use tonic::codegen::http::Uri;
use tonic::codegen::InterceptedService;
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tower::service_fn;

use crate::error::Error;
use crate::lnrpc::lightning_client::LightningClient;

pub type LndClient = LightningClient<InterceptedService<Channel, MacaroonInterceptor>>;

#[derive(Debug)]
pub(crate) struct PinnedCertVerifier {
    certs: Vec<Vec<u8>>,
    provider: Arc<CryptoProvider>,
}

impl PinnedCertVerifier {
    pub(crate) async fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read(path).await.map_err(|source| Error::Certificate {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(path, &contents)
    }

    pub(crate) fn from_pem(path: &Path, pem: &[u8]) -> Result<Self, Error> {
        let mut reader = std::io::Cursor::new(pem);
        let certs = rustls_pemfile::certs(&mut reader)
            .map(|cert| cert.map(|c| c.to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| Error::Certificate {
                path: path.to_path_buf(),
                source,
            })?;

        if certs.is_empty() {
            return Err(Error::Certificate {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "no PEM certificate found",
                ),
            });
        }

        Ok(Self {
            certs,
            provider: Arc::new(ring::default_provider()),
        })
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let mut presented = intermediates
            .iter()
            .map(|c| c.as_ref().to_vec())
            .collect::<Vec<Vec<u8>>>();
        presented.push(end_entity.as_ref().to_vec());
        presented.sort();

        let mut pinned = self.certs.clone();
        pinned.sort();

        if pinned != presented {
            return Err(TlsError::General(
                "server certificates do not match the pinned certificate".to_string(),
            ));
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        tokio_rustls::rustls::crypto::verify_tls12_signature(
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
        tokio_rustls::rustls::crypto::verify_tls13_signature(
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

/// Adds the hex encoded macaroon, when there is one, to every request.
#[derive(Debug, Clone, Default)]
pub struct MacaroonInterceptor {
    macaroon: Option<String>,
}

impl MacaroonInterceptor {
    pub fn new(macaroon: Option<String>) -> Self {
        Self { macaroon }
    }
}

impl Interceptor for MacaroonInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(macaroon) = &self.macaroon {
            request.metadata_mut().insert(
                "macaroon",
                MetadataValue::from_str(macaroon)
                    .map_err(|e| Status::internal(format!("Invalid macaroon: {e}")))?,
            );
        }
        Ok(request)
    }
}

pub(crate) async fn load_macaroon(path: &Path) -> Result<String, Error> {
    let macaroon = fs::read(path).await.map_err(|source| Error::Macaroon {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(macaroon))
}

pub(crate) fn client_config(verifier: PinnedCertVerifier) -> Arc<ClientConfig> {
    let mut config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    // grpc servers insist on negotiating http/2
    config.alpn_protocols = vec![b"h2".to_vec()];
    Arc::new(config)
}

/// Opens a TLS channel to `host:port`, trusting only the pinned certificate.
pub(crate) async fn connect_channel(
    host: &str,
    port: u16,
    tls: Arc<ClientConfig>,
) -> Result<Channel, Error> {
    // TLS is layered by the connector, tonic only sees a plain stream
    let endpoint = Endpoint::from_shared(format!("http://{host}:{port}"))
        .map_err(|e| Error::InvalidEndpoint(format!("{host}:{port}: {e}")))?;

    let server_name = ServerName::try_from(host)
        .map(|name| name.to_owned())
        .map_err(|e| Error::InvalidEndpoint(format!("{host}: {e}")))?;

    let connector = TlsConnector::from(tls);
    let addr = format!("{host}:{port}");

    let channel = endpoint
        .connect_with_connector(service_fn(move |_: Uri| {
            let connector = connector.clone();
            let server_name = server_name.clone();
            let addr = addr.clone();
            async move {
                let tcp = TcpStream::connect(addr).await?;
                connector.connect(server_name, tcp).await
            }
        }))
        .await?;

    Ok(channel)
}
