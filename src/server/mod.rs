//! Listener lifecycle and per-connection dispatch.

pub mod listener;

pub use listener::{Handler, Server};
