//! Connection registry
//!
//! The set of currently open peer connections. Connection tasks register and
//! deregister concurrently while other tasks iterate for broadcast, so the
//! map sits behind a read/write lock.

use super::{ConnectionId, DeliveryError, Frame};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Sending side of a peer's outbound queue
#[derive(Debug, Clone)]
pub struct PeerHandle {
    outbound: mpsc::Sender<Frame>,
}

impl PeerHandle {
    /// Queue a frame for the peer without waiting.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// A freshly registered connection: its id and the frames relayed to it.
///
/// `outbound` yields `None` once the connection has been removed from the
/// registry, which is the signal for its task to close the socket.
#[derive(Debug)]
pub struct PeerConnection {
    pub id: ConnectionId,
    pub outbound: mpsc::Receiver<Frame>,
}

/// Registry of open peer connections
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<ConnectionId, PeerHandle>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry whose peers buffer up to `queue_capacity` frames
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a newly opened connection
    pub fn add(&self) -> PeerConnection {
        let (outbound, receiver) = mpsc::channel(self.queue_capacity);
        let id = ConnectionId::new();
        self.peers.write().insert(id, PeerHandle { outbound });
        PeerConnection {
            id,
            outbound: receiver,
        }
    }

    /// Deregister a connection. Returns `false` if it was already gone.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.peers.write().remove(&id).is_some()
    }

    /// Deregister every connection
    pub fn clear(&self) {
        self.peers.write().clear();
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Invoke `f` for every registered connection other than `origin`.
    ///
    /// The registry is read-locked for the duration, so `f` must not call
    /// back into `add`, `remove` or `clear`.
    pub fn for_each_except<F>(&self, origin: ConnectionId, mut f: F)
    where
        F: FnMut(ConnectionId, &PeerHandle),
    {
        let peers = self.peers.read();
        for (id, peer) in peers.iter() {
            if *id != origin {
                f(*id, peer);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PEER_QUEUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_and_remove() {
        let registry = ConnectionRegistry::new(4);
        let a = registry.add();
        let b = registry.add();

        assert_eq!(registry.len(), 2);
        assert_ne!(a.id, b.id);
        assert!(registry.contains(a.id));

        assert!(registry.remove(a.id));
        assert!(!registry.remove(a.id));
        assert!(!registry.contains(a.id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_for_each_except_skips_origin() {
        let registry = ConnectionRegistry::new(4);
        let a = registry.add();
        let b = registry.add();
        let c = registry.add();

        let mut visited = Vec::new();
        registry.for_each_except(a.id, |id, _| visited.push(id));

        assert_eq!(visited.len(), 2);
        assert!(visited.contains(&b.id));
        assert!(visited.contains(&c.id));
        assert!(!visited.contains(&a.id));
    }

    #[test]
    fn test_removed_peer_sees_closed_queue() {
        let registry = ConnectionRegistry::new(4);
        let mut a = registry.add();

        registry.remove(a.id);
        assert!(matches!(
            a.outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_full_queue_reports_full() {
        let registry = ConnectionRegistry::new(1);
        let a = registry.add();
        let origin = ConnectionId::new();

        let mut results = Vec::new();
        for _ in 0..2 {
            registry.for_each_except(origin, |_, peer| {
                results.push(peer.try_deliver(Frame::from_static(b"x")));
            });
        }

        assert_eq!(results, vec![Ok(()), Err(DeliveryError::Full)]);
        drop(a);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ConnectionRegistry::new(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..100 {
                        let conn = registry.add();
                        registry.for_each_except(conn.id, |_, _| {});
                        if i % 2 == 0 {
                            registry.remove(conn.id);
                        } else {
                            kept.push(conn);
                        }
                    }
                    kept.len()
                })
            })
            .collect();

        let kept: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(registry.len(), kept);
        assert_eq!(kept, 400);
    }
}
