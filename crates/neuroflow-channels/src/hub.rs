use neuroflow_core::{BroadcastMessage, GraphTopology, HeatDelta, RealtimeEvent, StepEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A connected observer.
#[derive(Debug)]
struct Observer {
    session_id: String,
    tx: mpsc::UnboundedSender<String>,
}

/// Handle returned by [`RealtimeHub::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    /// Observer id, used to unsubscribe.
    pub id: Uuid,
    /// JSON-encoded events addressed to this observer.
    pub receiver: mpsc::UnboundedReceiver<String>,
}

/// Manages realtime observers and routes events to them.
pub struct RealtimeHub {
    observers: RwLock<HashMap<Uuid, Observer>>,
}

impl RealtimeHub {
    /// Create an empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an observer for the given session.
    pub async fn subscribe(&self, session_id: impl Into<String>) -> Subscription {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let session_id = session_id.into();
        info!(observer_id = %id, session_id = %session_id, "Observer added");
        self.observers
            .write()
            .await
            .insert(id, Observer { session_id, tx });
        Subscription { id, receiver }
    }

    /// Unsubscribe an observer.
    pub async fn remove(&self, id: Uuid) {
        if self.observers.write().await.remove(&id).is_some() {
            info!(observer_id = %id, "Observer removed");
        }
    }

    /// Number of live observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Route an event: session-scoped payloads go to the originating
    /// session's observers, everything else to all observers.
    ///
    /// Returns the number of observers the event was handed to.
    pub async fn publish(&self, event: &RealtimeEvent) -> usize {
        if event.is_session_scoped() {
            self.send_to_session(event).await
        } else {
            self.broadcast(event).await
        }
    }

    /// Deliver to observers of `event.session_id` only.
    pub async fn send_to_session(&self, event: &RealtimeEvent) -> usize {
        let session_id = event.session_id.clone();
        self.deliver(event, |obs| obs.session_id == session_id).await
    }

    /// Deliver to every observer.
    pub async fn broadcast(&self, event: &RealtimeEvent) -> usize {
        self.deliver(event, |_| true).await
    }

    /// Publish a step event for a session.
    pub async fn log_step(&self, session_id: &str, step: &StepEvent) -> usize {
        self.publish(&RealtimeEvent::new(
            session_id,
            BroadcastMessage::Log(step.clone()),
        ))
        .await
    }

    /// Publish a full topology snapshot to everyone.
    pub async fn graph_data(&self, session_id: &str, topology: GraphTopology) -> usize {
        self.publish(&RealtimeEvent::new(
            session_id,
            BroadcastMessage::GraphData(topology),
        ))
        .await
    }

    /// Publish a single-node heat delta to everyone.
    pub async fn graph_heat(&self, session_id: &str, delta: HeatDelta) -> usize {
        self.publish(&RealtimeEvent::new(
            session_id,
            BroadcastMessage::GraphHeat(delta),
        ))
        .await
    }

    async fn deliver<F>(&self, event: &RealtimeEvent, filter: F) -> usize
    where
        F: Fn(&Observer) -> bool,
    {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode realtime event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let observers = self.observers.read().await;
            for (id, obs) in observers.iter().filter(|(_, o)| filter(o)) {
                if obs.tx.send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut observers = self.observers.write().await;
            for id in dead {
                observers.remove(&id);
                debug!(observer_id = %id, "Dropped disconnected observer");
            }
        }

        delivered
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use neuroflow_core::StepStatus;

    #[tokio::test]
    async fn test_step_events_stay_in_session() {
        let hub = RealtimeHub::new();
        let mut mine = hub.subscribe("s1").await;
        let mut other = hub.subscribe("s2").await;

        let step = StepEvent::new("[KERNEL]", "hola", StepStatus::Success);
        assert_eq!(hub.log_step("s1", &step).await, 1);

        let msg: serde_json::Value =
            serde_json::from_str(&mine.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "log");
        assert_eq!(msg["session_id"], "s1");
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heat_delta_reaches_everyone() {
        let hub = RealtimeHub::new();
        let mut a = hub.subscribe("s1").await;
        let mut b = hub.subscribe("s2").await;

        let delta = HeatDelta {
            node_id: "Gobierno".into(),
            new_weight: 25,
        };
        assert_eq!(hub.graph_heat("s1", delta).await, 2);
        assert!(a.receiver.recv().await.unwrap().contains("graph_heat"));
        assert!(b.receiver.recv().await.unwrap().contains("graph_heat"));
    }

    #[tokio::test]
    async fn test_disconnected_observer_is_dropped_silently() {
        let hub = RealtimeHub::new();
        let gone = hub.subscribe("s1").await;
        let mut alive = hub.subscribe("s1").await;
        drop(gone.receiver);

        let delivered = hub.graph_data("s1", GraphTopology::default()).await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.observer_count().await, 1);
        assert!(alive.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_without_observers_is_noop() {
        let hub = RealtimeHub::new();
        let step = StepEvent::new("[LLM]", "x", StepStatus::Running);
        assert_eq!(hub.log_step("nobody", &step).await, 0);
    }

    #[tokio::test]
    async fn test_remove_observer() {
        let hub = RealtimeHub::new();
        let sub = hub.subscribe("s1").await;
        hub.remove(sub.id).await;
        assert_eq!(hub.observer_count().await, 0);
    }
}
