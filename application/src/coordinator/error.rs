//! Coordinator runtime error taxonomy

use thiserror::Error;

use colloquy_domain::{ConfigurationError, SelectionError, TerminationError, ValidationError};

use crate::gate::GateClosed;
use crate::ports::message_bus::BusError;

use super::events::SerializableChatError;

/// Errors raised while coordinating a conversation.
///
/// Strategy failures ([`Selection`](Self::Selection),
/// [`Validation`](Self::Validation), [`UnknownSpeaker`](Self::UnknownSpeaker))
/// are conversation-fatal: the coordinator emits exactly one
/// termination-with-error event and then re-raises them through the gate's
/// fault channel.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("speaker '{0}' not found among the registered participants")]
    UnknownSpeaker(String),

    #[error("response from '{0}', which is not an active speaker")]
    UnexpectedResponse(String),

    #[error("no handler registered for '{0}' events")]
    UnhandledMessage(&'static str),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Termination(#[from] TerminationError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("the conversation run was cancelled")]
    Cancelled,

    #[error("the coordinator has stopped")]
    Stopped,
}

impl ChatError {
    /// Stable kind identifier used in transcripts and serialized errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Configuration(_) => "configuration",
            ChatError::UnknownSpeaker(_) => "unknown_speaker",
            ChatError::UnexpectedResponse(_) => "unexpected_response",
            ChatError::UnhandledMessage(_) => "unhandled_message",
            ChatError::Selection(_) => "selection_failure",
            ChatError::Validation(_) => "validation_failure",
            ChatError::Termination(_) => "termination_failure",
            ChatError::Bus(_) => "bus_failure",
            ChatError::Cancelled => "cancelled",
            ChatError::Stopped => "stopped",
        }
    }
}

impl From<GateClosed> for ChatError {
    fn from(_: GateClosed) -> Self {
        ChatError::Stopped
    }
}

impl From<&ChatError> for SerializableChatError {
    fn from(error: &ChatError) -> Self {
        SerializableChatError::new(error.kind(), error.to_string())
    }
}
