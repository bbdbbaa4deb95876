//! Session coordination
//!
//! Ties frame ingress to the broadcast fan-out and, while recording, to the
//! recorder pipeline.

pub mod coordinator;

pub use coordinator::SessionCoordinator;
