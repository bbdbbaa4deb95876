//! Frame relay module
//!
//! Tracks open peer connections and fans inbound frames out to them:
//! - ConnectionRegistry holds one bounded outbound queue per peer
//! - fan_out delivers a frame to every peer except its origin

pub mod broadcast;
pub mod registry;

pub use broadcast::{fan_out, FanOutReport};
pub use registry::{ConnectionRegistry, PeerConnection, PeerHandle};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// One opaque encoded image, shared between destinations without copying.
pub type Frame = bytes::Bytes;

/// Opaque identity of an open peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a fresh, unique connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a relayed frame could not be handed to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}
