//! Realtime broadcast channel for neuroflow.
//!
//! Observers (typically WebSocket connections) subscribe with a session id
//! and receive JSON-encoded [`RealtimeEvent`](neuroflow_core::RealtimeEvent)s.
//! Step events go only to the originating session; graph snapshots and heat
//! deltas go to everyone. Delivery is best-effort: an observer whose receiver
//! is gone is dropped on the next send and the sender never sees an error.

/// Observer registry and fan-out.
pub mod hub;

pub use hub::{RealtimeHub, Subscription};
