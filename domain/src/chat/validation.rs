//! Pluggable validation of a conversation's starting state

use async_trait::async_trait;
use thiserror::Error;

use super::message::ChatMessage;

/// A start request was rejected by the group state validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid group state: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Validates the initial messages of a conversation before the coordinator
/// commits them to the thread. Rejection is conversation-fatal.
#[async_trait]
pub trait GroupStateValidator: Send + Sync {
    async fn validate(&self, messages: &[ChatMessage]) -> Result<(), ValidationError>;
}

/// Default validator: accepts any starting state.
pub struct AcceptingValidator;

#[async_trait]
impl GroupStateValidator for AcceptingValidator {
    async fn validate(&self, _messages: &[ChatMessage]) -> Result<(), ValidationError> {
        Ok(())
    }
}
