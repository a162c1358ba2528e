//! Upstream connection and response relay.
//!
//! The relay is fully streaming: upstream body bytes are framed to the
//! client as chunked transfer-coding as they arrive, and the total byte
//! count - unknowable until the stream ends - is sent as a trailer.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::UpstreamConfig;
use crate::http::headers::Headers;
use crate::http::response::{self, StatusCode};
use crate::http::writer::ResponseWriter;

/// Read buffer size for the upstream header block.
const BUFFER_SIZE: usize = 8192;

/// Largest chunked frame the relay emits per upstream read.
const MAX_CHUNK_SIZE: usize = 1024;

/// Upper bound on the upstream header block.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Forwards requests to one configured upstream.
pub struct ProxyHandler {
    host: String,
    port: u16,
    connect_timeout: Duration,
    request_timeout: Duration,
}

/// Parsed upstream status line and headers, plus whatever body bytes
/// arrived in the same reads.
struct UpstreamHead {
    status: StatusCode,
    content_length: Option<usize>,
    leftover: BytesMut,
}

impl ProxyHandler {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let url = url::Url::parse(&cfg.url).context("invalid upstream URL")?;
        if url.scheme() != "http" {
            bail!("only http upstreams are supported, got {:?}", url.scheme());
        }
        let host = url
            .host_str()
            .context("upstream URL missing host")?
            .to_string();
        let port = url.port().unwrap_or(80);

        Ok(Self {
            host,
            port,
            connect_timeout: Duration::from_millis(cfg.connect_timeout_ms),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        })
    }

    /// Fetches `target` from the upstream and relays the response.
    ///
    /// The upstream status code passes through verbatim; the body is
    /// re-framed as chunked with an `X-Content-Length` trailer carrying the
    /// relayed byte count. If the upstream cannot be reached before anything
    /// is written to the client, a plain 502 goes out instead.
    pub async fn forward<W>(&self, mut writer: ResponseWriter<W>, target: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let mut upstream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(%addr, "upstream connect failed: {e}");
                return bad_gateway(writer).await;
            }
            Err(_) => {
                warn!(%addr, "upstream connect timed out");
                return bad_gateway(writer).await;
            }
        };

        let head = match timeout(
            self.request_timeout,
            request_head(&mut upstream, &self.host, target),
        )
        .await
        {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                warn!(%addr, "upstream request failed: {e:#}");
                return bad_gateway(writer).await;
            }
            Err(_) => {
                warn!(%addr, "upstream response timed out");
                return bad_gateway(writer).await;
            }
        };

        let mut headers = response::default_headers(0);
        headers.remove("Content-Length");
        headers.replace("Transfer-Encoding", "chunked");
        headers.set("Trailer", "X-Content-Length");

        writer.write_status_line(head.status).await?;
        writer.write_headers(&headers).await?;

        let relayed = self.relay_body(&mut upstream, &mut writer, head).await?;

        writer.write_chunked_body_done(true).await?;
        let mut trailers = Headers::new();
        trailers.set("X-Content-Length", &relayed.to_string());
        writer.write_trailers(&trailers).await?;

        info!(%addr, target, bytes = relayed, "relayed upstream response");
        Ok(())
    }

    /// Streams the upstream body to the client one chunked frame per read,
    /// bounded by the upstream `Content-Length` when declared, otherwise
    /// until the upstream closes.
    async fn relay_body<W>(
        &self,
        upstream: &mut TcpStream,
        writer: &mut ResponseWriter<W>,
        head: UpstreamHead,
    ) -> Result<usize>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut remaining = head.content_length;
        let mut leftover = head.leftover;
        let mut relayed = 0usize;

        // Body bytes that arrived with the header block go out first.
        if let Some(limit) = remaining {
            leftover.truncate(limit);
        }
        while !leftover.is_empty() {
            let take = leftover.len().min(MAX_CHUNK_SIZE);
            let frame = leftover.split_to(take);
            writer.write_chunked_body(&frame).await?;
            relayed += take;
            if let Some(r) = remaining.as_mut() {
                *r -= take;
            }
        }

        let mut buffer = [0u8; MAX_CHUNK_SIZE];
        loop {
            if remaining == Some(0) {
                break;
            }
            let want = match remaining {
                Some(r) => r.min(MAX_CHUNK_SIZE),
                None => MAX_CHUNK_SIZE,
            };
            let n = timeout(self.request_timeout, upstream.read(&mut buffer[..want]))
                .await
                .context("upstream read timed out")??;
            if n == 0 {
                if let Some(r) = remaining {
                    bail!("upstream closed mid-body, {r} bytes short");
                }
                break;
            }
            writer.write_chunked_body(&buffer[..n]).await?;
            relayed += n;
            if let Some(r) = remaining.as_mut() {
                *r -= n;
            }
        }

        Ok(relayed)
    }
}

/// Serializes the request sent to the upstream.
///
/// Public so integration tests can assert the exact bytes.
pub fn build_upstream_request(host: &str, target: &str) -> Vec<u8> {
    let mut headers = Headers::new();
    headers.set("Host", host);
    headers.set("Connection", "close");

    let mut buf = format!("GET {target} HTTP/1.1\r\n").into_bytes();
    for (name, value) in headers.iter() {
        buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Sends the upstream request and reads the response head.
async fn request_head(upstream: &mut TcpStream, host: &str, target: &str) -> Result<UpstreamHead> {
    upstream
        .write_all(&build_upstream_request(host, target))
        .await?;
    upstream.flush().await?;

    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    loop {
        let n = upstream.read_buf(&mut buffer).await?;
        if n == 0 {
            bail!("upstream closed before completing its header block");
        }

        if let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            let head_bytes = buffer.split_to(end + 4);
            let (status, headers) = parse_upstream_head(&head_bytes)?;
            let content_length = headers.get("Content-Length").and_then(|v| v.parse().ok());
            return Ok(UpstreamHead {
                status,
                content_length,
                leftover: buffer,
            });
        }

        if buffer.len() > MAX_HEAD_SIZE {
            bail!("upstream header block too large");
        }
    }
}

fn parse_upstream_head(head: &[u8]) -> Result<(StatusCode, Headers)> {
    let line_end = head
        .windows(2)
        .position(|window| window == b"\r\n")
        .context("missing upstream status line")?;
    let status_line =
        std::str::from_utf8(&head[..line_end]).context("upstream status line is not UTF-8")?;

    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next().context("empty upstream status line")?;
    let code: u16 = parts
        .next()
        .context("upstream status line missing code")?
        .parse()
        .context("invalid upstream status code")?;

    let mut headers = Headers::new();
    let mut rest = &head[line_end + 2..];
    loop {
        let (n, done) = headers
            .parse_line(rest)
            .map_err(|e| anyhow::anyhow!("bad upstream header: {e}"))?;
        if done {
            break;
        }
        if n == 0 {
            bail!("truncated upstream header block");
        }
        rest = &rest[n..];
    }

    Ok((StatusCode::from_u16(code), headers))
}

/// Client-facing failure response when the upstream is unreachable.
async fn bad_gateway<W>(mut writer: ResponseWriter<W>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let body = b"502 Bad Gateway\n";
    writer.write_status_line(StatusCode::Other(502)).await?;
    writer
        .write_headers(&response::default_headers(body.len()))
        .await?;
    writer.write_body(body).await?;
    Ok(())
}
