//! Termination condition contract
//!
//! A termination condition is a stateful predicate over message deltas:
//! the coordinator feeds it each round's delta and stops the conversation
//! when it returns a [`StopMessage`]. Conditions accumulate state across
//! calls and must be reset before reuse.

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::message::{StopMessage, ThreadMessage};

mod conditions;

pub use conditions::{AnyTermination, MaxMessageTermination, TextMentionTermination};

/// Misuse of a termination condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminationError {
    #[error("termination condition has already been reached")]
    AlreadyTerminated,
}

/// Stateful predicate deciding when a conversation should stop.
#[async_trait]
pub trait TerminationCondition: Send {
    /// Whether the condition has already signalled a stop since the last
    /// reset.
    fn terminated(&self) -> bool;

    /// Feed the next message delta. Returns a stop message when the
    /// conversation should end. Calling this on a terminated condition is
    /// an error; callers must [`reset`](Self::reset) first.
    async fn evaluate(
        &mut self,
        delta: &[ThreadMessage],
    ) -> Result<Option<StopMessage>, TerminationError>;

    /// Clear accumulated state and the terminated flag.
    async fn reset(&mut self);
}
