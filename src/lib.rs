//! Hearth - HTTP/1.1 straight from TCP
//!
//! Core library for HTTP/1.1 message framing over raw byte streams and the
//! serving loop that drives it.

pub mod config;
pub mod http;
pub mod proxy;
pub mod server;
