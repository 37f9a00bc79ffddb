/// boxed source of a transport failure, e.g. a `std::io::Error` or a TLS error
pub type TransportSource = Box<dyn core::error::Error + Send + Sync + 'static>;

/// every way a single send attempt can fail.
/// Nothing here is retried; each variant is terminal for the attempt.
/// The Display output never contains credentials, so it is safe to hand
/// back to the caller of an HTTP endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    // rejected before any network activity
    #[error("Missing required field {0}")]
    MissingField(&'static str),
    #[error("Invalid recipient")]
    InvalidRecipient,
    #[error("Header {0} contains a line break")]
    InvalidHeader(&'static str),

    #[error("SMTP connection timed out")]
    ConnectTimeout,
    #[error("Transport error: {0}")]
    TransportError(#[source] TransportSource),

    #[error("Authentication failed ({code})")]
    AuthenticationFailed { code: u16, line: String },
    #[error("SMTP error: {line}")]
    ProtocolError { code: u16, line: String },
    #[error("Malformed reply line {line:?}")]
    ParseError { line: String },
    // https://datatracker.ietf.org/doc/html/rfc5321#section-4.5.3.1.5
    #[error("Reply line too long (max {max} octets)")]
    LineTooLong { max: usize },
}

impl SmtpError {
    pub(crate) fn transport(err: impl Into<TransportSource>) -> Self {
        SmtpError::TransportError(err.into())
    }

    pub(crate) fn parse(line: &[u8]) -> Self {
        SmtpError::ParseError {
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }

    /// Whether the failure was caused by the request itself rather than by
    /// the server or the network.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SmtpError::MissingField(_) | SmtpError::InvalidRecipient | SmtpError::InvalidHeader(_)
        )
    }

    /// HTTP status a request handler should answer with for this failure.
    pub fn http_status(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

/// errors produced while loading [`SenderConfig`](crate::SenderConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Environment variable {name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}
