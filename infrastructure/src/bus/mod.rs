//! In-process message bus and coordinator wiring

mod local;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use colloquy_application::GroupChatCoordinator;

pub use local::{BusDelivery, LocalChatBus, TopicSubscription};

/// Pump deliveries from a topic subscription into a coordinator.
///
/// The task ends when the subscription's topic is dropped from the bus or
/// the bus itself goes away. Events the coordinator has no handler for
/// are logged and skipped; the bus keeps delivering.
pub fn attach_coordinator(
    mut subscription: TopicSubscription,
    coordinator: Arc<GroupChatCoordinator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(delivery) = subscription.recv().await {
            if let Err(e) = coordinator.handle_event(delivery.event, delivery.cancellation) {
                error!(error = %e, "coordinator rejected bus event");
            }
        }
    })
}
