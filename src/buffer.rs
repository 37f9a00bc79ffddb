use std::{io, time::Duration};

use crate::{ReadWrite, SmtpError};

/// Longest reply line we accept, including the CRLF.
/// <https://datatracker.ietf.org/doc/html/rfc5321#section-4.5.3.1.5>
pub const MAX_REPLY_LINE: usize = 512;

const READ_CHUNK: usize = 1024;

enum Scan {
    // index of the \r of the first \r\n
    Line(usize),
    // bare \r or \n at this index
    Malformed(usize),
    Incomplete,
}

/// Accumulates raw socket data and hands out complete CRLF-terminated lines.
///
/// Lines split across several reads are reassembled before they are returned.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer { buf: Vec::new() }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// bytes received but not yet returned as part of a line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    // we error out on lines which aren't terminated with \r\n
    // https://datatracker.ietf.org/doc/html/rfc5321#section-2.3.8
    fn scan(&self) -> Scan {
        let mut iter = self.buf.iter().enumerate();
        while let Some((idx, byte)) = iter.next() {
            match byte {
                b'\r' => {
                    return match iter.next() {
                        Some((_, b'\n')) => Scan::Line(idx),
                        Some(_) => Scan::Malformed(idx),
                        None => Scan::Incomplete,
                    };
                }
                b'\n' => return Scan::Malformed(idx),
                _ => {}
            }
        }
        Scan::Incomplete
    }

    /// Removes the next complete line from the buffer and returns it without
    /// its terminator, or `None` when more data is needed.
    pub fn next_line(&mut self) -> Result<Option<String>, SmtpError> {
        match self.scan() {
            Scan::Line(end) => {
                if end + 2 > MAX_REPLY_LINE {
                    return Err(SmtpError::LineTooLong {
                        max: MAX_REPLY_LINE,
                    });
                }
                let mut line: Vec<u8> = self.buf.drain(..end + 2).collect();
                line.truncate(end);
                String::from_utf8(line)
                    .map(Some)
                    .map_err(|err| SmtpError::parse(err.as_bytes()))
            }
            Scan::Malformed(at) => Err(SmtpError::parse(&self.buf[..at])),
            Scan::Incomplete if self.buf.len() >= MAX_REPLY_LINE => Err(SmtpError::LineTooLong {
                max: MAX_REPLY_LINE,
            }),
            Scan::Incomplete => Ok(None),
        }
    }
}

/// Reads complete reply lines from a transport, giving up when the server
/// stays silent for longer than the idle timeout.
///
/// The timeout is re-armed for every read, so a slow but steady server is
/// never cut off.
pub struct LineReader<T: ReadWrite> {
    stream: T,
    lines: LineBuffer,
    chunk: Box<[u8]>,
    idle: Duration,
}

impl<T: ReadWrite> LineReader<T> {
    pub fn new(stream: T, idle: Duration) -> Self {
        LineReader {
            stream,
            lines: LineBuffer::new(),
            chunk: vec![0; READ_CHUNK].into_boxed_slice(),
            idle,
        }
    }

    pub async fn next_line(&mut self) -> Result<String, SmtpError> {
        loop {
            if let Some(line) = self.lines.next_line()? {
                return Ok(line);
            }
            let read = tokio::time::timeout(self.idle, self.stream.read(&mut self.chunk[..])).await;
            let n_bytes = match read {
                Err(_elapsed) => return Err(SmtpError::ConnectTimeout),
                Ok(result) => result.map_err(SmtpError::transport)?,
            };
            if n_bytes == 0 {
                return Err(SmtpError::transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
            self.lines.extend(&self.chunk[..n_bytes]);
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_nothing_until_terminated() {
        let mut buf = LineBuffer::new();
        buf.extend(b"220 smtp.example");
        assert_eq!(buf.next_line().unwrap(), None);
        buf.extend(b".com ready\r");
        assert_eq!(buf.next_line().unwrap(), None);
        buf.extend(b"\n");
        assert_eq!(
            buf.next_line().unwrap().as_deref(),
            Some("220 smtp.example.com ready")
        );
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn drains_lines_one_at_a_time() {
        let mut buf = LineBuffer::new();
        buf.extend(b"250-smtp.example.com\r\n250-PIPELINING\r\n250 AUTH LOGIN\r\n334 VXNl");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("250-smtp.example.com"));
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("250-PIPELINING"));
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("250 AUTH LOGIN"));
        assert_eq!(buf.next_line().unwrap(), None);
        assert_eq!(buf.pending(), "334 VXNl".len());
    }

    #[test]
    fn empty_line_is_a_line() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\r\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn bare_line_feed_is_rejected() {
        let mut buf = LineBuffer::new();
        buf.extend(b"220 ready\n");
        assert!(matches!(
            buf.next_line(),
            Err(SmtpError::ParseError { line }) if line == "220 ready"
        ));
    }

    #[test]
    fn bare_carriage_return_is_rejected() {
        let mut buf = LineBuffer::new();
        buf.extend(b"220 re\rady\r\n");
        assert!(matches!(buf.next_line(), Err(SmtpError::ParseError { .. })));
    }

    #[test]
    fn overlong_unterminated_line_is_rejected() {
        let mut buf = LineBuffer::new();
        buf.extend(&[b'a'; MAX_REPLY_LINE]);
        assert!(matches!(
            buf.next_line(),
            Err(SmtpError::LineTooLong { max: MAX_REPLY_LINE })
        ));
    }

    #[test]
    fn overlong_terminated_line_is_rejected() {
        let mut buf = LineBuffer::new();
        buf.extend(&[b'a'; MAX_REPLY_LINE - 1]);
        buf.extend(b"\r\n");
        assert!(matches!(buf.next_line(), Err(SmtpError::LineTooLong { .. })));
    }

    #[test]
    fn longest_allowed_line_passes() {
        let mut buf = LineBuffer::new();
        buf.extend(&[b'a'; MAX_REPLY_LINE - 2]);
        buf.extend(b"\r\n");
        assert_eq!(buf.next_line().unwrap().map(|l| l.len()), Some(MAX_REPLY_LINE - 2));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut buf = LineBuffer::new();
        buf.extend(b"250 \xff\xfe\r\n");
        assert!(matches!(buf.next_line(), Err(SmtpError::ParseError { .. })));
    }
}
