use core::ops::{Deref, DerefMut};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ReadWrite;

/// Adapts any tokio stream to [`ReadWrite`].
#[derive(Debug)]
pub struct TokioIo<T: AsyncRead + AsyncWrite + Unpin + Send>(pub T);

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Deref for TokioIo<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DerefMut for TokioIo<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ReadWrite for TokioIo<T> {
    type Error = tokio::io::Error;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.0.read(buf).await
    }

    async fn write_single(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        if buf.is_empty() {
            return Ok(());
        }
        self.0.write_all(buf).await?;
        self.0.flush().await
    }

    // commands are a handful of short pieces, gluing them together keeps
    // every command a single write on the wire
    async fn write_multi(&mut self, buf: &[&[u8]]) -> Result<(), Self::Error> {
        match buf {
            [single] => self.write_single(single).await,
            _ => self.write_single(&buf.concat()).await,
        }
    }

    async fn shutdown(&mut self) -> Result<(), Self::Error> {
        self.0.shutdown().await
    }
}

#[cfg(feature = "rustls")]
mod rustls_support {
    use std::{sync::Arc, time::Duration};

    use tokio::net::TcpStream;
    use tokio_rustls::{TlsConnector, client::TlsStream};

    use super::TokioIo;
    use crate::{Connector, Endpoint, SmtpError};

    /// Connects with implicit TLS (e.g. port 465): the TLS handshake happens
    /// before the server's greeting.
    #[derive(Debug, Clone)]
    pub struct RustlsConnector {
        config: Arc<rustls::ClientConfig>,
    }

    impl RustlsConnector {
        pub fn new() -> Self {
            let root_cert_store =
                rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = rustls::ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();
            Self::with_config(Arc::new(config))
        }

        /// Use a custom rustls configuration, e.g. with a private CA.
        pub fn with_config(config: Arc<rustls::ClientConfig>) -> Self {
            RustlsConnector { config }
        }
    }

    impl Connector for RustlsConnector {
        type Stream = TokioIo<TlsStream<TcpStream>>;

        async fn connect(
            &self,
            endpoint: &Endpoint,
            timeout: Duration,
        ) -> Result<Self::Stream, SmtpError> {
            let server_name = rustls::pki_types::ServerName::try_from(endpoint.host().to_owned())
                .map_err(SmtpError::transport)?;
            let connector = TlsConnector::from(self.config.clone());
            let handshake = async {
                let tcp = TcpStream::connect((endpoint.host(), endpoint.port())).await?;
                connector.connect(server_name, tcp).await
            };
            match tokio::time::timeout(timeout, handshake).await {
                Err(_elapsed) => Err(SmtpError::ConnectTimeout),
                Ok(Ok(tls)) => Ok(TokioIo(tls)),
                Ok(Err(err)) => {
                    #[cfg(feature = "log-04")]
                    log::warn!("could not connect to {endpoint}: {err}");
                    Err(SmtpError::transport(err))
                }
            }
        }
    }
}

#[cfg(feature = "rustls")]
pub use rustls_support::RustlsConnector;
