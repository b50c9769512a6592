//! Streaming HTTP/1.x request tokenizer.
//!
//! The parser does not build requests itself. It walks the byte stream and
//! reports what it finds through [`ParserEvents`]; the connection owns the
//! accumulation of those events into a [`Request`](crate::http::request::Request).
//!
//! [`Parser::execute`] is fed the connection's unparsed input and returns how
//! many bytes it consumed. It stops right after a message completes, so any
//! pipelined bytes stay with the caller until the current response is out.

use std::fmt;

use crate::http::request::Method;

/// Request line facts reported once the head has been tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHead {
    pub method: Method,
    pub version: String,
    pub keep_alive: bool,
}

/// Callbacks fired while tokenizing. Every method defaults to a no-op.
///
/// Fragment callbacks may fire more than once per element; receivers must
/// append rather than overwrite.
pub trait ParserEvents {
    fn on_message_begin(&mut self) {}
    fn on_url(&mut self, _fragment: &[u8]) {}
    fn on_header_field(&mut self, _fragment: &[u8]) {}
    fn on_header_value(&mut self, _fragment: &[u8]) {}
    fn on_headers_complete(&mut self, _head: &MessageHead) {}
    fn on_body(&mut self, _fragment: &[u8]) {}
    fn on_message_complete(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidVersion,
    InvalidHeader,
    InvalidContentLength,
    UnsupportedTransferEncoding,
    HeadTooLarge,
    BodyTooLarge,
    UnexpectedEof,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParseError::InvalidRequest => "malformed request line",
            ParseError::InvalidMethod => "unknown request method",
            ParseError::InvalidVersion => "unsupported HTTP version",
            ParseError::InvalidHeader => "malformed header line",
            ParseError::InvalidContentLength => "invalid Content-Length",
            ParseError::UnsupportedTransferEncoding => "transfer encodings are not supported",
            ParseError::HeadTooLarge => "request head too large",
            ParseError::BodyTooLarge => "declared request body too large",
            ParseError::UnexpectedEof => "connection closed mid-message",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for (the rest of) a request head.
    Head,
    /// Head done, this many body bytes still expected.
    Body(usize),
}

pub struct Parser {
    state: State,
    max_head_size: usize,
    max_body_size: usize,
    keep_alive: bool,
}

pub const DEFAULT_MAX_HEAD_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

impl Parser {
    pub fn new(max_head_size: usize) -> Self {
        Self::with_limits(max_head_size, DEFAULT_MAX_BODY_SIZE)
    }

    /// A parser rejecting heads over `max_head_size` bytes and declared
    /// bodies over `max_body_size` bytes.
    pub fn with_limits(max_head_size: usize, max_body_size: usize) -> Self {
        Self {
            state: State::Head,
            max_head_size,
            max_body_size,
            keep_alive: false,
        }
    }

    /// Whether the connection should persist after the last parsed message.
    pub fn should_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// True while a message has started but not completed.
    pub fn in_message(&self) -> bool {
        matches!(self.state, State::Body(_))
    }

    /// Tokenizes as much of `buf` as possible, stopping after at most one
    /// completed message. Returns the number of bytes consumed.
    pub fn execute<E>(&mut self, buf: &[u8], events: &mut E) -> Result<usize, ParseError>
    where
        E: ParserEvents + ?Sized,
    {
        let mut consumed = 0;

        if self.state == State::Head {
            // Stray CRLFs between messages are ignored.
            while buf[consumed..].starts_with(b"\r\n") {
                consumed += 2;
            }

            let rest = &buf[consumed..];
            let Some(headers_end) = find_headers_end(rest) else {
                if rest.len() > self.max_head_size {
                    return Err(ParseError::HeadTooLarge);
                }
                return Ok(consumed);
            };
            if headers_end > self.max_head_size {
                return Err(ParseError::HeadTooLarge);
            }

            let body_len = self.parse_head(&rest[..headers_end], events)?;
            consumed += headers_end + 4;
            self.state = State::Body(body_len);
        }

        if let State::Body(remaining) = self.state {
            let available = (buf.len() - consumed).min(remaining);
            if available > 0 {
                events.on_body(&buf[consumed..consumed + available]);
                consumed += available;
            }

            let remaining = remaining - available;
            if remaining == 0 {
                self.state = State::Head;
                events.on_message_complete();
            } else {
                self.state = State::Body(remaining);
            }
        }

        Ok(consumed)
    }

    /// Flushes the parser at end of input.
    ///
    /// `unparsed` is whatever the caller still holds; anything other than
    /// whitespace there, or a body still owed, means the peer hung up mid-message.
    pub fn finish(&mut self, unparsed: &[u8]) -> Result<(), ParseError> {
        if self.in_message() || unparsed.iter().any(|b| !b.is_ascii_whitespace()) {
            self.state = State::Head;
            return Err(ParseError::UnexpectedEof);
        }
        Ok(())
    }

    fn parse_head<E>(&mut self, head: &[u8], events: &mut E) -> Result<usize, ParseError>
    where
        E: ParserEvents + ?Sized,
    {
        let head = std::str::from_utf8(head).map_err(|_| ParseError::InvalidRequest)?;
        let mut lines = head.split("\r\n");

        // Request line
        let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
        let mut parts = request_line.split_whitespace();

        let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
        let target = parts.next().ok_or(ParseError::InvalidRequest)?;
        let version = parts.next().ok_or(ParseError::InvalidRequest)?;
        if parts.next().is_some() {
            return Err(ParseError::InvalidRequest);
        }

        let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            return Err(ParseError::InvalidVersion);
        }

        events.on_message_begin();
        events.on_url(target.as_bytes());

        // Headers
        let mut content_length = None;
        let mut connection_close = false;
        let mut connection_keep_alive = false;

        for line in lines {
            if line.is_empty() {
                continue;
            }

            let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(ParseError::InvalidHeader);
            }

            if key.eq_ignore_ascii_case("Content-Length") {
                let len = value
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength)?;
                if content_length.is_some_and(|prev| prev != len) {
                    return Err(ParseError::InvalidContentLength);
                }
                if len > self.max_body_size {
                    return Err(ParseError::BodyTooLarge);
                }
                content_length = Some(len);
            } else if key.eq_ignore_ascii_case("Transfer-Encoding") {
                return Err(ParseError::UnsupportedTransferEncoding);
            } else if key.eq_ignore_ascii_case("Connection") {
                for token in value.split(',').map(str::trim) {
                    connection_close |= token.eq_ignore_ascii_case("close");
                    connection_keep_alive |= token.eq_ignore_ascii_case("keep-alive");
                }
            }

            events.on_header_field(key.as_bytes());
            events.on_header_value(value.as_bytes());
        }

        self.keep_alive = if version == "HTTP/1.0" {
            connection_keep_alive
        } else {
            !connection_close
        };

        events.on_headers_complete(&MessageHead {
            method,
            version: version.to_string(),
            keep_alive: self.keep_alive,
        });

        Ok(content_length.unwrap_or(0))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEAD_SIZE)
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Count {
        begins: usize,
        completes: usize,
        body: Vec<u8>,
    }

    impl ParserEvents for Count {
        fn on_message_begin(&mut self) {
            self.begins += 1;
        }
        fn on_body(&mut self, fragment: &[u8]) {
            self.body.extend_from_slice(fragment);
        }
        fn on_message_complete(&mut self) {
            self.completes += 1;
        }
    }

    #[test]
    fn stops_after_one_message() {
        let input = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut parser = Parser::default();
        let mut events = Count::default();

        let consumed = parser.execute(input, &mut events).unwrap();

        assert_eq!(consumed, 19);
        assert_eq!(events.begins, 1);
        assert_eq!(events.completes, 1);
    }

    #[test]
    fn body_split_across_reads() {
        let mut parser = Parser::default();
        let mut events = Count::default();

        let head = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhe";
        assert_eq!(parser.execute(head, &mut events).unwrap(), head.len());
        assert!(parser.in_message());
        assert_eq!(events.completes, 0);

        assert_eq!(parser.execute(b"llo", &mut events).unwrap(), 3);
        assert_eq!(events.completes, 1);
        assert_eq!(events.body, b"hello");
    }
}
