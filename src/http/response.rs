use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Status codes this server originates, plus verbatim passthrough of
/// anything an upstream hands us when proxying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 500 Internal Server Error
    InternalServerError,
    /// Any other numeric code, rendered without a reason phrase.
    Other(u16),
}

impl StatusCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            400 => StatusCode::BadRequest,
            500 => StatusCode::InternalServerError,
            other => StatusCode::Other(other),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
            StatusCode::Other(code) => *code,
        }
    }

    /// The standard reason phrase, or `None` for passthrough codes.
    pub fn reason_phrase(&self) -> Option<&'static str> {
        match self {
            StatusCode::Ok => Some("OK"),
            StatusCode::BadRequest => Some("Bad Request"),
            StatusCode::InternalServerError => Some("Internal Server Error"),
            StatusCode::Other(_) => None,
        }
    }
}

/// Serializes just the status line.
///
/// Shared by the response writer and the connection driver's bare-400
/// rejection path, which sends a status line and nothing else.
pub async fn write_status_line<W>(w: &mut W, status: StatusCode) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = match status.reason_phrase() {
        Some(reason) => format!("{HTTP_VERSION} {} {reason}\r\n", status.as_u16()),
        None => format!("{HTTP_VERSION} {}\r\n", status.as_u16()),
    };
    w.write_all(line.as_bytes()).await
}

/// Serializes a header (or trailer) block: one `name: value` line per field,
/// terminated by a blank line.
pub(crate) async fn write_header_block<W>(w: &mut W, headers: &Headers) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for (name, value) in headers.iter() {
        w.write_all(name.as_bytes()).await?;
        w.write_all(b": ").await?;
        w.write_all(value.as_bytes()).await?;
        w.write_all(b"\r\n").await?;
    }
    w.write_all(b"\r\n").await
}

/// Baseline response headers for a body of `content_length` bytes.
///
/// Callers override entries with [`Headers::replace`] before writing.
pub fn default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", &content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}
