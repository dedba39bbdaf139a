//! Port for the publish/subscribe message bus.
//!
//! The coordinator never talks to a transport directly: it publishes
//! [`ChatEvent`]s to topics through this port. Directed delivery (one
//! participant) and group broadcast are the same operation addressed at
//! different topics; the participant registry decides which is which.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use colloquy_domain::TopicId;

use crate::coordinator::events::ChatEvent;

/// A publish operation could not be completed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("publish to topic '{0}' failed: {1}")]
    PublishFailed(String, String),

    #[error("publish was cancelled")]
    Cancelled,
}

/// Typed pub/sub transport connecting the coordinator with participants.
///
/// The cancellation context is attached per operation: implementations
/// either honor it (abort a slow delivery) or ignore it for transports
/// where publishing cannot block.
#[async_trait]
pub trait ChatBus: Send + Sync {
    async fn publish(
        &self,
        topic: &TopicId,
        event: ChatEvent,
        cancellation: &CancellationToken,
    ) -> Result<(), BusError>;
}
