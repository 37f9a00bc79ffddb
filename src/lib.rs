use std::time::Duration;

mod error;
pub use error::*;

mod buffer;
pub use buffer::{LineBuffer, LineReader, MAX_REPLY_LINE};

mod config;
pub use config::*;

mod request;
pub use request::SendRequest;

pub mod message;
pub mod reply;
pub mod session;
pub mod state;

pub mod smtp;
pub use smtp::SmtpSender;

pub mod integrations {
    pub mod tokio;
}

/// A bidirectional byte stream an SMTP session can run over,
/// e.g. a TLS stream or a scripted mock.
pub trait ReadWrite {
    type Error: core::error::Error + Send + Sync + 'static;
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, Self::Error>>;
    fn write_single(&mut self, buf: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;
    fn write_multi(&mut self, buf: &[&[u8]]) -> impl Future<Output = Result<(), Self::Error>> {
        async move {
            for b in buf {
                self.write_single(b).await?;
            }
            Ok(())
        }
    }
    /// Closes the write side. Called once, on every exit path of a session.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), Self::Error>> {
        async move { Ok(()) }
    }
}

/// Opens one fresh connection per email.
pub trait Connector {
    type Stream: ReadWrite;
    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Stream, SmtpError>>;
}
