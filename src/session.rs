use crate::{
    LineReader, ReadWrite, SendRequest, SenderConfig, SmtpError,
    message::Message,
    reply::ReplyLine,
    state::{Command, SessionState, Transition},
};

/// One SMTP conversation delivering one email.
///
/// Owns its transport, line buffer and state, so concurrent sessions never
/// share anything but the read-only config.
pub struct Session<'c, T: ReadWrite> {
    reader: LineReader<T>,
    config: &'c SenderConfig,
    state: SessionState,
    // code of the multi-line reply currently being read, if any
    continuation: Option<u16>,
}

impl<'c, T: ReadWrite> Session<'c, T> {
    pub fn new(stream: T, config: &'c SenderConfig) -> Self {
        Session {
            reader: LineReader::new(stream, config.timeout()),
            config,
            state: SessionState::AwaitGreeting,
            continuation: None,
        }
    }

    /// Runs the whole conversation and closes the transport, whatever the
    /// outcome.
    pub async fn deliver(mut self, request: &SendRequest) -> Result<(), SmtpError> {
        let result = self.converse(request).await;
        #[cfg(feature = "log-04")]
        if let Err(err) = &result {
            log::warn!("delivery to {} failed in {:?}: {err}", request.to(), self.state);
        }
        // the delivery outcome stands whatever the close does
        let timeout = self.config.timeout();
        #[cfg_attr(not(feature = "log-04"), allow(unused_variables))]
        let closed = tokio::time::timeout(timeout, self.reader.get_mut().shutdown()).await;
        #[cfg(feature = "log-04")]
        match closed {
            Err(_elapsed) => log::debug!("closing the connection timed out"),
            Ok(Err(err)) => log::debug!("closing the connection failed: {err}"),
            Ok(Ok(())) => {}
        }
        result
    }

    async fn converse(&mut self, request: &SendRequest) -> Result<(), SmtpError> {
        loop {
            let line = self.reader.next_line().await?;
            #[cfg(feature = "log-04")]
            log::debug!("s>{line}");
            let reply = ReplyLine::parse(&line)?;
            let code = reply.code();

            if let Some(group) = self.continuation {
                if group != code {
                    return Err(SmtpError::ParseError { line });
                }
            }
            if !reply.is_last() {
                self.continuation = Some(code);
                continue;
            }
            self.continuation = None;

            match self.state.on_reply(code) {
                Transition::Advance { command, next } => {
                    self.send(command, request).await?;
                    self.state = next;
                }
                Transition::Finish(command) => {
                    self.send(command, request).await?;
                    #[cfg(feature = "log-04")]
                    log::info!("delivered mail to {}", request.to());
                    return Ok(());
                }
                Transition::RejectCredentials => {
                    return Err(SmtpError::AuthenticationFailed { code, line });
                }
                Transition::Reject => return Err(SmtpError::ProtocolError { code, line }),
            }
        }
    }

    async fn send(&mut self, command: Command, request: &SendRequest) -> Result<(), SmtpError> {
        use base64::prelude::*;
        let config = self.config;
        match command {
            Command::Ehlo => {
                #[cfg(feature = "log-04")]
                log::debug!("c>EHLO {}", config.ehlo_domain());
                self.write(&[b"EHLO ", config.ehlo_domain().as_bytes(), b"\r\n"])
                    .await
            }
            Command::AuthLogin => {
                #[cfg(feature = "log-04")]
                log::debug!("c>AUTH LOGIN");
                self.write(&[b"AUTH LOGIN\r\n"]).await
            }
            Command::Username | Command::Password => {
                let credentials = config.credentials();
                let raw = match command {
                    Command::Username => credentials.account(),
                    _ => credentials.secret().expose(),
                };
                #[cfg(feature = "log-04")]
                log::debug!("c>[censored]");
                let encoded = BASE64_STANDARD.encode(raw);
                self.write(&[encoded.as_bytes(), b"\r\n"]).await
            }
            Command::MailFrom => {
                #[cfg(feature = "log-04")]
                log::debug!("c>MAIL FROM:<{}>", config.sender());
                self.write(&[b"MAIL FROM:<", config.sender().as_bytes(), b">\r\n"])
                    .await
            }
            Command::RcptTo => {
                #[cfg(feature = "log-04")]
                log::debug!("c>RCPT TO:<{}>", request.to());
                self.write(&[b"RCPT TO:<", request.to().as_bytes(), b">\r\n"])
                    .await
            }
            Command::Data => {
                #[cfg(feature = "log-04")]
                log::debug!("c>DATA");
                self.write(&[b"DATA\r\n"]).await
            }
            Command::Message => {
                let data = Message::new(request, config).to_data();
                #[cfg(feature = "log-04")]
                log::debug!("c>[{} bytes of data]<CR><LF>.<CR><LF>", data.len());
                // one write for the whole payload
                self.write(&[data.as_slice()]).await
            }
            Command::Quit => {
                #[cfg(feature = "log-04")]
                log::debug!("c>QUIT");
                self.write(&[b"QUIT\r\n"]).await
            }
        }
    }

    async fn write(&mut self, parts: &[&[u8]]) -> Result<(), SmtpError> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, self.reader.get_mut().write_multi(parts)).await {
            Err(_elapsed) => Err(SmtpError::ConnectTimeout),
            Ok(result) => result.map_err(SmtpError::transport),
        }
    }
}
