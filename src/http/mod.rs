//! HTTP/1.1 message framing.
//!
//! This module implements HTTP/1.1 framing directly on top of a raw byte
//! stream - no higher-level HTTP library is involved anywhere.
//!
//! # Architecture
//!
//! - **`headers`**: Case-insensitive header store with a line-at-a-time
//!   incremental parser for the header block
//! - **`parser`**: The resumable request parser state machine
//! - **`request`**: Parsed request representation and the transport read loop
//! - **`response`**: Status code vocabulary and status-line/header serialization
//! - **`writer`**: The response writer state machine enforcing legal write order
//!
//! # Request Parser State Machine
//!
//! The parser consumes the inbound stream in arbitrarily sized increments,
//! tolerant of any chunk boundaries the transport produces:
//!
//! ```text
//!        ┌─────────────┐
//!        │ Initialized │ ← Waiting for the request line
//!        └──────┬──────┘
//!               │ Request line parsed
//!               ▼
//!        ┌────────────────┐
//!        │ ParsingHeaders │ ← One CRLF-terminated field line at a time
//!        └──────┬─────────┘
//!               │ Blank line seen
//!               ▼
//!        ┌────────────────┐
//!        │  ParsingBody   │ ← Accumulate exactly Content-Length bytes
//!        └──────┬─────────┘
//!               │ Declared length reached (or no body declared)
//!               ▼
//!        ┌────────────────┐
//!        │      Done      │
//!        └────────────────┘
//! ```
//!
//! The response writer mirrors this with a strict linear write order:
//! status line → headers → body → (trailers, only after a chunked body that
//! declared them) → complete. Calling a write operation out of order is a
//! usage error, not a transport error.

pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
