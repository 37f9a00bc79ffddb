//! RFC 5322 message rendering for the DATA phase.
//!
//! A [`Message`] turns a [`SendRequest`] into the exact bytes written after
//! the server's `354` prompt: headers, a blank line, the dot-stuffed body and
//! the terminating `.` line.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::{SendRequest, SenderConfig};

// encoded words may be at most 75 chars; 45 raw bytes is 60 in base64,
// plus the 12 chars of `=?UTF-8?B?` and `?=`
// https://datatracker.ietf.org/doc/html/rfc2047#section-2
const ENCODED_WORD_CHUNK: usize = 45;

// https://datatracker.ietf.org/doc/html/rfc5322#section-2.1.1
const MAX_LINE: usize = 78;

/// A plain-text email ready to be written to the server.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    date: DateTime<Utc>,
    message_id: String,
    sender: &'a str,
    brand: Option<&'a str>,
    request: &'a SendRequest,
}

impl<'a> Message<'a> {
    /// Create a message dated now with a fresh Message-ID.
    pub fn new(request: &'a SendRequest, config: &'a SenderConfig) -> Self {
        Message {
            date: Utc::now(),
            message_id: generate_message_id(config.sender()),
            sender: config.sender(),
            brand: config.brand(),
            request,
        }
    }

    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// `id` is given without angle brackets.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    /// The From header: the author's name, the configured brand, and the
    /// account that actually sends the mail.
    pub fn from_header(&self) -> String {
        let name = match self.brand {
            Some(brand) => Cow::Owned(format!("{} via {}", self.request.from_name(), brand)),
            None => Cow::Borrowed(self.request.from_name()),
        };
        mailbox(&name, self.sender)
    }

    /// Everything to write after `354`, ending in `\r\n.\r\n`.
    pub fn to_data(&self) -> Vec<u8> {
        let request = self.request;
        let mut out = Vec::with_capacity(512 + request.body().len());
        let mut header = |name: &str, value: &str| {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        };
        header("From", &self.from_header());
        header("To", &format!("<{}>", request.to()));
        header("Reply-To", &mailbox(request.from_name(), request.reply_to()));
        header("Subject", &encode_header(request.subject()));
        header("Date", &self.date.to_rfc2822());
        header("Message-ID", &format!("<{}>", self.message_id));
        header("MIME-Version", "1.0");
        header("Content-Type", "text/plain; charset=UTF-8");
        header("Content-Transfer-Encoding", "8bit");

        out.extend_from_slice(b"\r\n");
        dot_stuff(request.body(), &mut out);
        out.extend_from_slice(b"\r\n.\r\n");
        out
    }
}

/// Generate a unique Message-ID using the current time.
pub fn generate_message_id(sender: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let domain = sender
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or("localhost");
    format!("{ts:x}.{seq:x}@{domain}")
}

/// `"Display Name" <address>`, or an encoded word when the name is not ascii.
fn mailbox(display_name: &str, address: &str) -> String {
    if display_name.is_ascii() {
        let escaped = display_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\" <{address}>")
    } else {
        format!("{} <{address}>", encode_header(display_name))
    }
}

/// RFC 2047 `B` encoding for non-ascii header text, folded so that no
/// encoded word exceeds 75 characters. Ascii text is only folded.
pub fn encode_header(value: &str) -> Cow<'_, str> {
    if value.is_ascii() {
        return fold(value);
    }
    let mut words = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        // never split a utf-8 sequence across two words
        let mut end = rest.len().min(ENCODED_WORD_CHUNK);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        words.push(format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(chunk)));
        rest = tail;
    }
    Cow::Owned(words.join("\r\n "))
}

/// Folds ascii header text at spaces so no line exceeds 78 characters.
/// Words longer than that stay whole.
fn fold(value: &str) -> Cow<'_, str> {
    if value.len() <= MAX_LINE {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 16);
    let mut line_len = 0;
    for (idx, word) in value.split(' ').enumerate() {
        if idx > 0 {
            // a folded line never holds only whitespace
            if line_len > 1 && line_len + 1 + word.len() > MAX_LINE {
                out.push_str("\r\n ");
                line_len = 1;
            } else {
                out.push(' ');
                line_len += 1;
            }
        }
        out.push_str(word);
        line_len += word.len();
    }
    Cow::Owned(out)
}

/// Appends `body` to `out` with CRLF line endings, doubling the leading dot
/// of every line that starts with one.
/// <https://datatracker.ietf.org/doc/html/rfc5321#section-4.5.2>
pub fn dot_stuff(body: &str, out: &mut Vec<u8>) {
    for (idx, line) in body.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if idx > 0 {
            out.extend_from_slice(b"\r\n");
        }
        if line.starts_with('.') {
            out.push(b'.');
        }
        out.extend_from_slice(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{Credentials, Endpoint, Secret};

    fn config() -> SenderConfig {
        SenderConfig::new(
            Endpoint::new("smtp.example.eu", 465),
            Credentials::new("askian@askian.net", Secret::new("pw")),
        )
        .with_brand("The Cast")
    }

    fn stuffed(body: &str) -> String {
        let mut out = Vec::new();
        dot_stuff(body, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_headers_in_order() {
        let config = config();
        let request = SendRequest::new(
            "ada@askian.net",
            "gran@example.com",
            "Gran",
            "Sunday lunch",
            "See you at one.",
        );
        let date = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let data = Message::new(&request, &config)
            .with_date(date)
            .with_message_id("abc@askian.net")
            .to_data();
        let data = String::from_utf8(data).unwrap();

        let expected = format!(
            "From: \"Gran via The Cast\" <askian@askian.net>\r\n\
            To: <ada@askian.net>\r\n\
            Reply-To: \"Gran\" <gran@example.com>\r\n\
            Subject: Sunday lunch\r\n\
            Date: {}\r\n\
            Message-ID: <abc@askian.net>\r\n\
            MIME-Version: 1.0\r\n\
            Content-Type: text/plain; charset=UTF-8\r\n\
            Content-Transfer-Encoding: 8bit\r\n\
            \r\n\
            See you at one.\r\n\
            .\r\n",
            date.to_rfc2822()
        );
        assert!(date.to_rfc2822().ends_with("Jan 2025 12:00:00 +0000"));
        assert_eq!(data, expected);
    }

    #[test]
    fn from_header_without_brand() {
        let config = SenderConfig::new(
            Endpoint::new("smtp.example.eu", 465),
            Credentials::new("askian@askian.net", Secret::new("pw")),
        );
        let request = SendRequest::new("ada@askian.net", "g@e.com", "Gran", "Hi", "x");
        assert_eq!(
            Message::new(&request, &config).from_header(),
            "\"Gran\" <askian@askian.net>"
        );
    }

    #[test]
    fn quotes_in_display_name_are_escaped() {
        assert_eq!(
            mailbox("Ada \"Countess\" L", "ada@example.com"),
            "\"Ada \\\"Countess\\\" L\" <ada@example.com>"
        );
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        assert_eq!(encode_header("Grüße"), "=?UTF-8?B?R3LDvMOfZQ==?=");
        assert_eq!(encode_header("plain"), "plain");
    }

    #[test]
    fn long_non_ascii_subject_is_folded_on_char_boundaries() {
        let subject = "é".repeat(40);
        let encoded = encode_header(&subject);
        let words: Vec<_> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);
        let mut decoded = Vec::new();
        for word in words {
            assert!(word.len() <= 75, "{word}");
            let b64 = word
                .strip_prefix("=?UTF-8?B?")
                .and_then(|w| w.strip_suffix("?="))
                .unwrap();
            let bytes = BASE64_STANDARD.decode(b64).unwrap();
            // every word decodes on its own
            assert!(String::from_utf8(bytes.clone()).is_ok());
            decoded.extend(bytes);
        }
        assert_eq!(String::from_utf8(decoded).unwrap(), subject);
    }

    #[test]
    fn long_ascii_subject_is_folded_at_spaces() {
        let subject = "Photos from the seaside weekend with everyone".repeat(4);
        let folded = encode_header(&subject);
        assert!(folded.contains("\r\n "));
        for line in folded.split("\r\n") {
            assert!(line.len() <= 78, "{line:?}");
            assert!(!line.trim().is_empty());
        }
        assert_eq!(folded.replace("\r\n ", " "), subject);

        let short = "Photos from the seaside";
        assert!(matches!(encode_header(short), Cow::Borrowed(s) if s == short));
    }

    #[test]
    fn overlong_ascii_word_is_not_split() {
        let word = "x".repeat(100);
        let subject = format!("Hi {word} there");
        let folded = encode_header(&subject);
        assert_eq!(folded, format!("Hi\r\n {word}\r\n there"));
    }

    #[test]
    fn non_ascii_display_name_is_encoded() {
        assert_eq!(
            mailbox("Zoë", "zoe@example.com"),
            "=?UTF-8?B?Wm/Dqw==?= <zoe@example.com>"
        );
    }

    #[test]
    fn dot_stuffing() {
        assert_eq!(stuffed(".starts"), "..starts");
        assert_eq!(stuffed("a\r\n.\r\nb"), "a\r\n..\r\nb");
        assert_eq!(stuffed("a\n..escaped"), "a\r\n...escaped");
        assert_eq!(stuffed("no dots. here."), "no dots. here.");
    }

    #[test]
    fn bare_line_feeds_become_crlf() {
        assert_eq!(stuffed("one\ntwo\r\nthree\n"), "one\r\ntwo\r\nthree\r\n");
    }

    #[test]
    fn message_ids_are_unique() {
        let a = generate_message_id("askian@askian.net");
        let b = generate_message_id("askian@askian.net");
        assert_ne!(a, b);
        assert!(a.ends_with("@askian.net"));
        assert!(generate_message_id("askian").ends_with("@localhost"));
    }
}
