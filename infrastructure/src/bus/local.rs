//! In-process topic bus
//!
//! A single-process implementation of the [`ChatBus`] port: a routing
//! table from topic to subscriber channels. Publishing pushes into
//! per-subscriber `mpsc` queues and each subscriber drains its own
//! [`TopicSubscription`], so delivery is asynchronous with respect to
//! the publisher. That is what lets a coordinator publish respond-now
//! requests while it is itself handling a gated event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use colloquy_application::coordinator::events::ChatEvent;
use colloquy_application::ports::message_bus::{BusError, ChatBus};
use colloquy_domain::TopicId;

/// One delivered event together with the cancellation context the
/// publisher attached to the operation.
#[derive(Debug)]
pub struct BusDelivery {
    pub event: ChatEvent,
    pub cancellation: CancellationToken,
}

type Routes = RwLock<HashMap<TopicId, HashMap<u64, mpsc::UnboundedSender<BusDelivery>>>>;

/// In-process pub/sub bus connecting coordinator and participants.
pub struct LocalChatBus {
    routes: Routes,
    next_subscriber_id: AtomicU64,
}

impl LocalChatBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: RwLock::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Register a subscriber for one topic. Dropping the returned
    /// subscription deregisters it.
    pub fn subscribe(self: &Arc<Self>, topic: impl Into<TopicId>) -> TopicSubscription {
        let topic = topic.into();
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
            routes.entry(topic.clone()).or_default().insert(id, tx);
        }
        debug!(%topic, id, "subscriber registered");
        TopicSubscription {
            rx,
            topic,
            id,
            bus: Arc::clone(self),
        }
    }

    fn deregister(&self, topic: &TopicId, id: u64) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        if let Some(subscribers) = routes.get_mut(topic) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                routes.remove(topic);
            }
            debug!(%topic, id, "subscriber deregistered");
        }
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &TopicId) -> usize {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(topic).map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatBus for LocalChatBus {
    async fn publish(
        &self,
        topic: &TopicId,
        event: ChatEvent,
        cancellation: &CancellationToken,
    ) -> Result<(), BusError> {
        if cancellation.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        match routes.get(topic) {
            Some(subscribers) if !subscribers.is_empty() => {
                for tx in subscribers.values() {
                    let _ = tx.send(BusDelivery {
                        event: event.clone(),
                        cancellation: cancellation.clone(),
                    });
                }
            }
            _ => {
                // A topic nobody listens on is not an error; participants
                // may come and go independently of the coordinator.
                debug!(%topic, kind = event.kind(), "no subscribers, dropping event");
            }
        }
        Ok(())
    }
}

/// Receiving side of one topic registration.
pub struct TopicSubscription {
    rx: mpsc::UnboundedReceiver<BusDelivery>,
    topic: TopicId,
    id: u64,
    bus: Arc<LocalChatBus>,
}

impl TopicSubscription {
    pub async fn recv(&mut self) -> Option<BusDelivery> {
        self.rx.recv().await
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        self.bus.deregister(&self.topic, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> TopicId {
        TopicId::new(name)
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_of_the_topic() {
        let bus = LocalChatBus::new();
        let mut first = bus.subscribe("shared");
        let mut second = bus.subscribe("shared");
        let mut other = bus.subscribe("elsewhere");

        bus.publish(&topic("shared"), ChatEvent::RequestSpeak, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            first.recv().await.unwrap().event,
            ChatEvent::RequestSpeak
        ));
        assert!(matches!(
            second.recv().await.unwrap().event,
            ChatEvent::RequestSpeak
        ));
        assert!(other.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_to_an_empty_topic_is_not_an_error() {
        let bus = LocalChatBus::new();
        let result = bus
            .publish(&topic("void"), ChatEvent::Reset, &CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancelled_publish_is_rejected() {
        let bus = LocalChatBus::new();
        let mut subscription = bus.subscribe("t");
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let result = bus
            .publish(&topic("t"), ChatEvent::RequestSpeak, &cancellation)
            .await;
        assert_eq!(result.unwrap_err(), BusError::Cancelled);
        assert!(subscription.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_a_subscription_deregisters_it() {
        let bus = LocalChatBus::new();
        let subscription = bus.subscribe("t");
        assert_eq!(bus.subscriber_count(&topic("t")), 1);

        drop(subscription);
        assert_eq!(bus.subscriber_count(&topic("t")), 0);
    }

    #[tokio::test]
    async fn deliveries_preserve_publish_order() {
        let bus = LocalChatBus::new();
        let mut subscription = bus.subscribe("t");
        let cancellation = CancellationToken::new();

        bus.publish(&topic("t"), ChatEvent::Pause, &cancellation)
            .await
            .unwrap();
        bus.publish(&topic("t"), ChatEvent::Resume, &cancellation)
            .await
            .unwrap();

        assert!(matches!(
            subscription.recv().await.unwrap().event,
            ChatEvent::Pause
        ));
        assert!(matches!(
            subscription.recv().await.unwrap().event,
            ChatEvent::Resume
        ));
    }
}
