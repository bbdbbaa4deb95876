//! HTTP and WebSocket handlers
//!
//! This module contains the endpoints the server exposes: recording control
//! and the per-connection frame stream.

pub mod recording;
pub mod stream;
