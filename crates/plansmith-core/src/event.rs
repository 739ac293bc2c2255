use tokio::sync::broadcast;
use tracing::trace;

use crate::types::PlannerEvent;

/// Events kept for a subscriber that falls behind before it starts lagging.
const DEFAULT_BACKLOG: usize = 256;

/// Fan-out of run progress to any number of listeners.
///
/// Publishing never blocks and never fails. A listener that falls more than
/// `backlog` events behind sees `RecvError::Lagged` and skips ahead.
pub struct EventBus {
    sender: broadcast::Sender<PlannerEvent>,
}

impl EventBus {
    pub fn new(backlog: usize) -> Self {
        let (sender, _) = broadcast::channel(backlog.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: PlannerEvent) {
        if self.sender.send(event).is_err() {
            trace!("Event dropped, nobody is listening");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.sender.subscribe()
    }

    /// Listeners currently attached.
    pub fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunId;

    #[tokio::test]
    async fn test_every_listener_sees_every_event() {
        let bus = EventBus::default();
        let mut progress = bus.subscribe();
        let mut audit = bus.subscribe();
        assert_eq!(bus.listeners(), 2);

        bus.publish(PlannerEvent::AgentStarted {
            agent: "writer".into(),
        });
        bus.publish(PlannerEvent::RunComplete {
            run_id: RunId::from_str("r1"),
            invocations: 1,
        });

        for rx in [&mut progress, &mut audit] {
            assert!(matches!(rx.recv().await.unwrap(), PlannerEvent::AgentStarted { agent } if agent == "writer"));
            assert!(matches!(rx.recv().await.unwrap(), PlannerEvent::RunComplete { invocations: 1, .. }));
        }
    }

    #[test]
    fn test_publish_without_listeners() {
        let bus = EventBus::new(0);
        assert_eq!(bus.listeners(), 0);
        bus.publish(PlannerEvent::AgentStarted { agent: "a".into() });
    }

    #[tokio::test]
    async fn test_slow_listener_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..4 {
            bus.publish(PlannerEvent::AgentStarted {
                agent: format!("a{}", i),
            });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert!(matches!(rx.recv().await.unwrap(), PlannerEvent::AgentStarted { agent } if agent == "a2"));
    }
}
