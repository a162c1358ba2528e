use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::http::headers::Headers;
use crate::http::parser::{ParseError, RequestParser};

// Read buffer starting size; doubled whenever a read fills it.
const INITIAL_BUFFER_SIZE: usize = 1024;

/// A fully parsed HTTP/1.1 request.
///
/// Produced once per connection by [`Request::from_stream`] and immutable
/// afterwards. `body` holds exactly the declared `Content-Length` bytes, or
/// is empty when the header is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The request method, uppercase ASCII letters only (e.g. "GET").
    pub method: String,
    /// The request-target exactly as it appeared on the wire, not decoded.
    pub target: String,
    /// The HTTP version component, always "1.1".
    pub version: String,
    /// Parsed header block.
    pub headers: Headers,
    /// Request body bytes.
    pub body: Vec<u8>,
}

impl Request {
    /// Reads and parses one request from `reader`.
    ///
    /// Drives the parser state machine against a growable buffer: bytes are
    /// appended at the unconsumed tail, the parser consumes what it can, and
    /// the leftover is shifted down before the next read. Works regardless of
    /// how the transport fragments the stream.
    pub async fn from_stream<R>(reader: &mut R) -> Result<Self, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut parser = RequestParser::new();
        let mut buffer = vec![0u8; INITIAL_BUFFER_SIZE];
        let mut filled = 0;

        while !parser.is_done() {
            if filled == buffer.len() {
                buffer.resize(buffer.len() * 2, 0);
            }

            let n = reader.read(&mut buffer[filled..]).await?;
            if n == 0 {
                let err = if parser.awaiting_body() {
                    ParseError::IncompleteBody
                } else {
                    ParseError::IncompleteHeaders
                };
                debug!(
                    consumed = parser.bytes_consumed(),
                    "stream ended mid-request: {err}"
                );
                return Err(err);
            }
            filled += n;

            let consumed = match parser.consume(&buffer[..filled]) {
                Ok(consumed) => consumed,
                Err(err) => {
                    debug!(
                        consumed = parser.bytes_consumed(),
                        "request parse failed: {err}"
                    );
                    return Err(err);
                }
            };
            buffer.copy_within(consumed..filled, 0);
            filled -= consumed;
        }

        parser.into_request().ok_or(ParseError::IncompleteHeaders)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The declared `Content-Length`, or 0 when absent or unparsable.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}
