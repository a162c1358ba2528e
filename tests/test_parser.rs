use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use hearth::http::parser::{ParseError, RequestParser};
use hearth::http::request::Request;

/// Feeds `data` to a parser in `chunk_size`-byte increments, maintaining the
/// same accumulate/consume/shift discipline the transport read loop uses.
fn parse_in_chunks(data: &[u8], chunk_size: usize) -> Result<Request, ParseError> {
    let mut parser = RequestParser::new();
    let mut buffer: Vec<u8> = Vec::new();

    for chunk in data.chunks(chunk_size) {
        buffer.extend_from_slice(chunk);
        let consumed = parser.consume(&buffer)?;
        buffer.drain(..consumed);
        if parser.is_done() {
            break;
        }
    }

    parser.into_request().ok_or(ParseError::IncompleteHeaders)
}

/// Yields at most `chunk_size` bytes per read, mimicking a transport that
/// fragments the stream however it likes.
struct ChunkReader {
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
}

impl ChunkReader {
    fn new(data: &[u8], chunk_size: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            chunk_size,
        }
    }
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos >= this.data.len() {
            return Poll::Ready(Ok(()));
        }
        let end = this
            .data
            .len()
            .min(this.pos + this.chunk_size)
            .min(this.pos + buf.remaining());
        buf.put_slice(&this.data[this.pos..end]);
        this.pos = end;
        Poll::Ready(Ok(()))
    }
}

#[test]
fn test_parse_result_is_identical_for_any_chunking() {
    let data = b"POST /submit HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nContent-Length: 11\r\n\r\nhello world";

    let whole = parse_in_chunks(data, data.len()).unwrap();
    for chunk_size in [1, 2, 3, 5, 8, 64] {
        let parsed = parse_in_chunks(data, chunk_size).unwrap();
        assert_eq!(parsed, whole, "chunk size {chunk_size} changed the result");
    }

    assert_eq!(whole.method, "POST");
    assert_eq!(whole.target, "/submit");
    assert_eq!(whole.body, b"hello world");
}

#[test]
fn test_parse_good_get_request() {
    let data = b"GET /coffee HTTP/1.1\r\nHost: x\r\n\r\n";

    let request = parse_in_chunks(data, 3).unwrap();

    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/coffee");
    assert_eq!(request.version, "1.1");
    assert_eq!(request.headers.get("host"), Some("x"));
    assert!(request.body.is_empty());
}

#[test]
fn test_parse_request_line_with_two_parts_fails() {
    let data = b"/coffee HTTP/1.1\r\nHost: localhost:42069\r\n\r\n";

    assert!(parse_in_chunks(data, 10).is_err());
}

#[test]
fn test_parse_request_line_with_method_out_of_order_fails() {
    let data = b"/coffee GET HTTP/1.1\r\nHost: localhost:42069\r\n\r\n";

    assert!(matches!(
        parse_in_chunks(data, 32),
        Err(ParseError::InvalidMethod)
    ));
}

#[test]
fn test_parse_lowercase_method_fails() {
    let data = b"get / HTTP/1.1\r\n\r\n";

    assert!(matches!(
        parse_in_chunks(data, 4),
        Err(ParseError::InvalidMethod)
    ));
}

#[test]
fn test_parse_unsupported_version_fails() {
    let data = b"GET / HTTP/3.0\r\nHost: localhost:42069\r\n\r\n";

    assert!(matches!(
        parse_in_chunks(data, 4),
        Err(ParseError::UnsupportedVersion(_))
    ));
}

#[test]
fn test_parse_without_content_length_has_no_body() {
    let data = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";

    let request = parse_in_chunks(data, 1).unwrap();

    assert!(request.body.is_empty());
    assert_eq!(request.content_length(), 0);
}

#[test]
fn test_parse_body_matches_content_length_exactly() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";

    let request = parse_in_chunks(data, 2).unwrap();

    assert_eq!(request.body, b"hello");
    assert_eq!(request.content_length(), 5);
}

#[test]
fn test_parse_body_overflow_fails() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 3\r\n\r\nhello";

    assert!(matches!(
        parse_in_chunks(data, data.len()),
        Err(ParseError::BodyOverflow)
    ));
}

#[test]
fn test_parse_malformed_content_length_fails() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: banana\r\n\r\nx";

    assert!(matches!(
        parse_in_chunks(data, data.len()),
        Err(ParseError::MalformedContentLength(_))
    ));
}

#[test]
fn test_consume_after_done_is_an_error() {
    let mut parser = RequestParser::new();
    let data = b"GET / HTTP/1.1\r\n\r\n";

    let consumed = parser.consume(data).unwrap();
    assert_eq!(consumed, data.len());
    assert!(parser.is_done());

    assert!(matches!(
        parser.consume(b"more"),
        Err(ParseError::AlreadyDone)
    ));
}

#[test]
fn test_bytes_consumed_tracks_progress() {
    let mut parser = RequestParser::new();
    let data = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";

    parser.consume(&data[..10]).unwrap();
    parser.consume(data).unwrap();

    assert!(parser.is_done());
    assert_eq!(parser.bytes_consumed(), data.len());
}

#[tokio::test]
async fn test_from_stream_with_tiny_reads() {
    let data = b"GET /coffee HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nAccept: */*\r\n\r\n";
    let mut reader = ChunkReader::new(data, 3);

    let request = Request::from_stream(&mut reader).await.unwrap();

    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/coffee");
    assert_eq!(request.version, "1.1");
    assert_eq!(request.headers.get("user-agent"), Some("curl/7.81.0"));
}

#[tokio::test]
async fn test_from_stream_eof_mid_headers_fails() {
    let data = b"GET / HTTP/1.1\r\nHost: x\r\n";
    let mut reader = ChunkReader::new(data, 8);

    assert!(matches!(
        Request::from_stream(&mut reader).await,
        Err(ParseError::IncompleteHeaders)
    ));
}

#[tokio::test]
async fn test_from_stream_eof_mid_body_fails() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let mut reader = ChunkReader::new(data, 8);

    assert!(matches!(
        Request::from_stream(&mut reader).await,
        Err(ParseError::IncompleteBody)
    ));
}

#[tokio::test]
async fn test_from_stream_completes_exactly_at_content_length() {
    let data = b"POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let mut reader = ChunkReader::new(data, 1);

    let request = Request::from_stream(&mut reader).await.unwrap();

    assert_eq!(request.body, b"hello");
}
