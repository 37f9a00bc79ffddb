use crate::{Connector, SendRequest, SenderConfig, SmtpError, session::Session};

#[cfg(feature = "rustls")]
use crate::integrations::tokio::RustlsConnector;

/// Delivers contact-form emails, one authenticated TLS session per email.
///
/// `send` takes `&self` and keeps no per-email state, so a single sender can
/// be shared between tasks.
///
/// # Example
///
/// ```ignore
/// let sender = SmtpSender::new(SenderConfig::from_env()?);
/// let request = SendRequest::new(
///     "ada@askian.net",
///     "gran@example.com",
///     "Gran",
///     "Sunday lunch",
///     "See you at one.",
/// );
/// sender.send(&request).await?;
/// ```
#[derive(Debug)]
pub struct SmtpSender<C: Connector> {
    config: SenderConfig,
    connector: C,
}

#[cfg(feature = "rustls")]
impl SmtpSender<RustlsConnector> {
    /// A sender connecting with implicit TLS, trusting the webpki roots.
    pub fn new(config: SenderConfig) -> Self {
        Self::with_connector(config, RustlsConnector::new())
    }
}

impl<C: Connector> SmtpSender<C> {
    pub fn with_connector(config: SenderConfig, connector: C) -> Self {
        SmtpSender { config, connector }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Checks the request against the allow-list and header rules without
    /// touching the network.
    pub fn validate(&self, request: &SendRequest) -> Result<(), SmtpError> {
        request.validate(self.config.allow_list())
    }

    /// Delivers `request`.
    ///
    /// Returns once the server accepted the message and `QUIT` was written.
    /// Invalid requests fail before a connection is opened.
    pub async fn send(&self, request: &SendRequest) -> Result<(), SmtpError> {
        if let Err(err) = self.validate(request) {
            #[cfg(feature = "log-04")]
            log::warn!("refusing to send: {err}");
            return Err(err);
        }
        #[cfg(feature = "log-04")]
        log::debug!("connecting to {}", self.config.endpoint());
        let stream = self
            .connector
            .connect(self.config.endpoint(), self.config.timeout())
            .await?;
        Session::new(stream, &self.config).deliver(request).await
    }
}

#[cfg(all(test, feature = "rustls"))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{Credentials, Endpoint, Secret};

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn tls_sender_can_be_shared_across_tasks() {
        let config = SenderConfig::new(
            Endpoint::new("smtp.example.eu", 465),
            Credentials::new("askian@askian.net", Secret::new("pw")),
        );
        let sender = Arc::new(SmtpSender::new(config));
        let request = SendRequest::new("ada@askian.net", "gran@example.com", "Gran", "Hi", "x");

        // never polled, only the future's type is checked
        let send = sender.send(&request);
        assert_send(&send);
        assert_send(&sender);
    }
}
