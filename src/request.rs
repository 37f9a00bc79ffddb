use serde::Deserialize;

use crate::{AllowList, SmtpError};

/// One email to deliver, as posted by the contact form:
/// `{"to", "replyTo", "fromName", "subject", "body"}`.
///
/// Absent JSON fields deserialize as empty strings so that [`validate`](Self::validate)
/// reports them the same way as blank ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    reply_to: String,
    #[serde(default)]
    from_name: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

impl SendRequest {
    pub fn new(
        to: impl Into<String>,
        reply_to: impl Into<String>,
        from_name: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        SendRequest {
            to: to.into(),
            reply_to: reply_to.into(),
            from_name: from_name.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn to(&self) -> &str {
        &self.to
    }
    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }
    pub fn from_name(&self) -> &str {
        &self.from_name
    }
    pub fn subject(&self) -> &str {
        &self.subject
    }
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The recipient's local-part, i.e. everything before the `@`.
    pub fn local_part(&self) -> &str {
        self.to.split('@').next().unwrap_or_default()
    }

    /// Checks everything that can be checked without talking to the server.
    pub fn validate(&self, allow_list: &AllowList) -> Result<(), SmtpError> {
        let fields = [
            ("to", &self.to),
            ("replyTo", &self.reply_to),
            ("fromName", &self.from_name),
            ("subject", &self.subject),
            ("body", &self.body),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SmtpError::MissingField(name));
            }
        }

        let Some((local, domain)) = self.to.split_once('@') else {
            return Err(SmtpError::InvalidRecipient);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(SmtpError::InvalidRecipient);
        }
        if !allow_list.contains(local) {
            return Err(SmtpError::InvalidRecipient);
        }

        // Validate headers don't contain line breaks (injection prevention)
        let headers = [
            ("To", &self.to),
            ("Reply-To", &self.reply_to),
            ("From", &self.from_name),
            ("Subject", &self.subject),
        ];
        for (name, value) in headers {
            if value.contains(['\r', '\n']) {
                return Err(SmtpError::InvalidHeader(name));
            }
        }
        // the addresses also go inside <...> on the wire
        if self.to.contains(['<', '>', ' ']) {
            return Err(SmtpError::InvalidRecipient);
        }
        if self.reply_to.contains(['<', '>']) {
            return Err(SmtpError::InvalidHeader("Reply-To"));
        }
        Ok(())
    }
}
