use thiserror::Error;

use crate::http::headers::{Headers, find_crlf};
use crate::http::request::Request;

/// Errors produced while parsing an inbound request.
///
/// "Need more bytes" is deliberately not represented here - the parser
/// signals it with a zero-progress, error-free return instead, so a line
/// split across two transport reads never looks like a failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line: {0}")]
    MalformedRequestLine(&'static str),
    #[error("method contains characters outside uppercase ASCII")]
    InvalidMethod,
    #[error("unsupported HTTP version {0:?}")]
    UnsupportedVersion(String),
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),
    #[error("malformed Content-Length value {0:?}")]
    MalformedContentLength(String),
    #[error("body exceeds declared Content-Length")]
    BodyOverflow,
    #[error("connection closed before end of headers")]
    IncompleteHeaders,
    #[error("connection closed before end of body")]
    IncompleteBody,
    #[error("parser driven past its terminal state")]
    AlreadyDone,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Initialized,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// Resumable request parser.
///
/// Feed it the unconsumed portion of the inbound stream with [`consume`]
/// as bytes arrive; it reports how far it got each time and the caller
/// discards exactly that prefix before the next call. One instance parses
/// exactly one request.
///
/// [`consume`]: RequestParser::consume
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    method: String,
    target: String,
    version: String,
    headers: Headers,
    body: Vec<u8>,
    consumed: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Initialized,
            method: String::new(),
            target: String::new(),
            version: String::new(),
            headers: Headers::new(),
            body: Vec::new(),
            consumed: 0,
        }
    }

    /// Makes as much progress as `data` allows.
    ///
    /// Returns the number of bytes consumed; the next call must be given a
    /// buffer starting at the first unconsumed byte. A return of `Ok(0)`
    /// while not yet [`is_done`](Self::is_done) means more bytes are needed.
    /// Driving a finished parser again is a usage error.
    pub fn consume(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.state == ParserState::Done {
            return Err(ParseError::AlreadyDone);
        }

        let mut total = 0;
        while self.state != ParserState::Done {
            let n = self.parse_single(&data[total..])?;
            total += n;
            if n == 0 && self.state != ParserState::Done {
                break;
            }
        }
        self.consumed += total;
        Ok(total)
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Total bytes consumed across all calls, valid even after a failure.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    pub(crate) fn awaiting_body(&self) -> bool {
        self.state == ParserState::ParsingBody
    }

    /// Yields the parsed request once the terminal state is reached.
    pub fn into_request(self) -> Option<Request> {
        match self.state {
            ParserState::Done => Some(Request {
                method: self.method,
                target: self.target,
                version: self.version,
                headers: self.headers,
                body: self.body,
            }),
            _ => None,
        }
    }

    fn parse_single(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParserState::Initialized => {
                let Some(idx) = find_crlf(data) else {
                    return Ok(0);
                };
                let line = std::str::from_utf8(&data[..idx])
                    .map_err(|_| ParseError::MalformedRequestLine("not valid UTF-8"))?;
                let (method, target, version) = parse_request_line(line)?;
                self.method = method.to_string();
                self.target = target.to_string();
                self.version = version.to_string();
                self.state = ParserState::ParsingHeaders;
                Ok(idx + 2)
            }
            ParserState::ParsingHeaders => {
                let (n, done) = self.headers.parse_line(data)?;
                if done {
                    self.state = ParserState::ParsingBody;
                }
                Ok(n)
            }
            ParserState::ParsingBody => {
                let Some(declared) = self.headers.get("Content-Length") else {
                    // No Content-Length means no body.
                    self.state = ParserState::Done;
                    return Ok(0);
                };
                let content_length: usize = declared
                    .parse()
                    .map_err(|_| ParseError::MalformedContentLength(declared.to_string()))?;

                self.body.extend_from_slice(data);
                if self.body.len() > content_length {
                    return Err(ParseError::BodyOverflow);
                }
                if self.body.len() == content_length {
                    self.state = ParserState::Done;
                }
                Ok(data.len())
            }
            ParserState::Done => Err(ParseError::AlreadyDone),
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a request line into `(method, target, version)`.
///
/// Exactly three single-space-separated parts are required. The method must
/// be entirely uppercase ASCII letters and the version literally `HTTP/1.1`.
fn parse_request_line(line: &str) -> Result<(&str, &str, &str), ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 {
        return Err(ParseError::MalformedRequestLine(
            "expected three space-separated parts",
        ));
    }
    let (method, target, version_text) = (parts[0], parts[1], parts[2]);

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseError::InvalidMethod);
    }

    let Some((protocol, version)) = version_text.split_once('/') else {
        return Err(ParseError::MalformedRequestLine("malformed version"));
    };
    if protocol != "HTTP" {
        return Err(ParseError::MalformedRequestLine("malformed version"));
    }
    if version != "1.1" {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    Ok((method, target, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_good() {
        let (method, target, version) = parse_request_line("GET /coffee HTTP/1.1").unwrap();
        assert_eq!(method, "GET");
        assert_eq!(target, "/coffee");
        assert_eq!(version, "1.1");
    }

    #[test]
    fn request_line_rejects_extra_parts() {
        assert!(parse_request_line("GET  / HTTP/1.1").is_err());
        assert!(parse_request_line("/coffee HTTP/1.1").is_err());
    }

    #[test]
    fn request_line_rejects_old_version() {
        assert!(matches!(
            parse_request_line("GET / HTTP/1.0"),
            Err(ParseError::UnsupportedVersion(v)) if v == "1.0"
        ));
    }
}
