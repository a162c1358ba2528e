use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;
use crate::http::response::{self, StatusCode};

/// Where the writer is in the legal write order for one outbound message.
///
/// `Trailers` is reachable only by finishing a chunked body with
/// `has_trailers = true`; otherwise `Body` steps straight to `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    StatusLine,
    Headers,
    Body,
    Trailers,
    Complete,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::StatusLine => "status-line",
            WriterState::Headers => "headers",
            WriterState::Body => "body",
            WriterState::Trailers => "trailers",
            WriterState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Errors produced by the response writer.
///
/// `InvalidState` marks a caller bug - a write operation issued out of
/// order. Nothing reaches the wire when it is returned.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("writer is in state {current}, operation requires {required}")]
    InvalidState {
        current: WriterState,
        required: WriterState,
    },
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Order-enforcing serializer for one outbound HTTP/1.1 message.
///
/// Owns the connection for the rest of its lifetime; a writer is bound to
/// exactly one message and is not reusable. Each operation is valid in
/// exactly one state and advances the machine on success.
pub struct ResponseWriter<W> {
    stream: W,
    state: WriterState,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            state: WriterState::StatusLine,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Emits `HTTP/1.1 <code> <reason>\r\n`, the number alone for
    /// passthrough codes without a known phrase.
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect_state(WriterState::StatusLine)?;
        response::write_status_line(&mut self.stream, status).await?;
        self.state = WriterState::Headers;
        Ok(())
    }

    /// Emits the header block followed by the terminating blank line.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::Headers)?;
        response::write_header_block(&mut self.stream, headers).await?;
        self.state = WriterState::Body;
        Ok(())
    }

    /// Writes a plain body in one shot. Terminal: nothing more can be sent
    /// on this message afterwards.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<(), WriteError> {
        self.expect_state(WriterState::Body)?;
        self.stream.write_all(body).await?;
        self.stream.flush().await?;
        self.state = WriterState::Complete;
        Ok(())
    }

    /// Emits one chunked transfer-coding frame: hex length, CRLF, payload,
    /// CRLF. May be called any number of times before
    /// [`write_chunked_body_done`](Self::write_chunked_body_done).
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<(), WriteError> {
        self.expect_state(WriterState::Body)?;
        let size_line = format!("{:X}\r\n", chunk.len());
        self.stream.write_all(size_line.as_bytes()).await?;
        self.stream.write_all(chunk).await?;
        self.stream.write_all(b"\r\n").await?;
        // Flush per frame so the peer sees the stream as it is produced.
        self.stream.flush().await?;
        Ok(())
    }

    /// Terminates a chunked body with the zero-length chunk.
    ///
    /// When trailers follow, the final CRLF is deferred to the trailer
    /// block; otherwise the message is complete.
    pub async fn write_chunked_body_done(&mut self, has_trailers: bool) -> Result<(), WriteError> {
        self.expect_state(WriterState::Body)?;
        let terminator: &[u8] = if has_trailers { b"0\r\n" } else { b"0\r\n\r\n" };
        self.stream.write_all(terminator).await?;
        self.stream.flush().await?;
        self.state = if has_trailers {
            WriterState::Trailers
        } else {
            WriterState::Complete
        };
        Ok(())
    }

    /// Emits the trailer block. Only reachable after a chunked body was
    /// terminated with trailers declared - the one place a value computed
    /// over the full streamed body can still be sent.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect_state(WriterState::Trailers)?;
        response::write_header_block(&mut self.stream, trailers).await?;
        self.stream.flush().await?;
        self.state = WriterState::Complete;
        Ok(())
    }

    /// Consumes the writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.stream
    }

    fn expect_state(&self, required: WriterState) -> Result<(), WriteError> {
        if self.state == required {
            Ok(())
        } else {
            Err(WriteError::InvalidState {
                current: self.state,
                required,
            })
        }
    }
}
