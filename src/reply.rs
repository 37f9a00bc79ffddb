use core::fmt::Display;

use crate::SmtpError;

/// A single line of a server reply, e.g. `250-PIPELINING` or `235 ok`.
///
/// Multi-line replies use a hyphen after the code on every line but the
/// last, which uses a space (or nothing at all).
/// <https://datatracker.ietf.org/doc/html/rfc5321#section-4.2>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    code: u16,
    is_last: bool,
    message: &'a str,
}

impl<'a> ReplyLine<'a> {
    /// Parses a line without its CRLF terminator.
    pub fn parse(line: &'a str) -> Result<Self, SmtpError> {
        let bytes = line.as_bytes();
        let Some(digits) = bytes.get(..3) else {
            return Err(SmtpError::parse(bytes));
        };
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(SmtpError::parse(bytes));
        }
        let code = digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));

        // byte 3 is ascii when present, so slicing at 4 is on a char boundary
        let (is_last, message) = match bytes.get(3) {
            None => (true, ""),
            Some(b' ') => (true, &line[4..]),
            Some(b'-') => (false, &line[4..]),
            Some(_) => return Err(SmtpError::parse(bytes)),
        };
        Ok(ReplyLine {
            code,
            is_last,
            message,
        })
    }

    pub fn code(&self) -> u16 {
        self.code
    }
    pub fn is_last(&self) -> bool {
        self.is_last
    }
    pub fn message(&self) -> &'a str {
        self.message
    }
}

impl Display for ReplyLine<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.code,
            if self.is_last { ' ' } else { '-' },
            self.message
        )
    }
}
