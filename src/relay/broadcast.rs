//! Broadcast fan-out
//!
//! Delivers one inbound frame to every other open connection. Delivery is
//! best effort and isolated per peer: a peer that cannot take the frame is
//! evicted, everyone else still gets it, and the origin never hears about it.

use super::{ConnectionId, ConnectionRegistry, Frame};

/// Outcome of relaying a single frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Number of peers the frame was queued for
    pub delivered: usize,

    /// Peers removed from the registry because delivery failed
    pub evicted: Vec<ConnectionId>,
}

/// Relay `frame` from `origin` to every other registered connection.
pub fn fan_out(registry: &ConnectionRegistry, origin: ConnectionId, frame: &Frame) -> FanOutReport {
    let mut report = FanOutReport::default();

    registry.for_each_except(origin, |id, peer| match peer.try_deliver(frame.clone()) {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            tracing::debug!(connection_id = %id, "Dropping peer: {}", e);
            report.evicted.push(id);
        }
    });

    // Eviction needs the write lock, so it happens after iteration
    for id in &report.evicted {
        registry.remove(*id);
    }

    report
}
