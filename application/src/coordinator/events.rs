//! Wire events and output stream items
//!
//! [`ChatEvent`] is the closed set of message kinds exchanged over the
//! bus between host, coordinator, and participants. Dispatch is a single
//! `match` resolved at compile time; a kind the coordinator has no
//! handler for is rejected as [`ChatError::UnhandledMessage`]
//! (see the coordinator module).

use serde::{Deserialize, Serialize};
use std::fmt;

use colloquy_domain::{ChatMessage, ChatResponse, StopMessage, ThreadMessage};

/// A participant or coordinator error in a form that can cross the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableChatError {
    /// Stable error kind identifier.
    pub error_type: String,
    /// Human-readable description.
    pub error_message: String,
}

impl SerializableChatError {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}

impl fmt::Display for SerializableChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}

/// The event kinds carried on the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Start (or continue) a conversation with optional initial messages.
    Start {
        messages: Vec<ChatMessage>,
        /// Whether the initial messages are also streamed to the output
        /// channel.
        output_task_messages: bool,
    },
    /// A single participant's reply for the current round.
    AgentResponse {
        source: String,
        response: ChatResponse,
    },
    /// A nested team's reply: the full message list it produced.
    TeamResponse {
        source: String,
        messages: Vec<ThreadMessage>,
    },
    /// Broadcast-only chat content relayed to the output channel.
    Message { message: ThreadMessage },
    /// Directed request asking one participant to respond now.
    RequestSpeak,
    /// A participant reports a failure; the conversation ends gracefully.
    Error { error: SerializableChatError },
    /// Clear conversation state and return to idle.
    Reset,
    /// Defer new speaker transitions.
    Pause,
    /// Lift a pause and run any deferred transition.
    Resume,
}

impl ChatEvent {
    /// Stable kind name, used for dispatch diagnostics and transcripts.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Start { .. } => "start",
            ChatEvent::AgentResponse { .. } => "agent_response",
            ChatEvent::TeamResponse { .. } => "team_response",
            ChatEvent::Message { .. } => "message",
            ChatEvent::RequestSpeak => "request_speak",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Reset => "reset",
            ChatEvent::Pause => "pause",
            ChatEvent::Resume => "resume",
        }
    }
}

/// Terminal event of a conversation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationEvent {
    /// Why the conversation stopped.
    pub message: StopMessage,
    /// Present when the stop was caused by an error.
    pub error: Option<SerializableChatError>,
}

impl TerminationEvent {
    pub fn new(message: StopMessage) -> Self {
        Self {
            message,
            error: None,
        }
    }

    pub fn with_error(message: StopMessage, error: SerializableChatError) -> Self {
        Self {
            message,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Items delivered on the output channel to the hosting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutput {
    Message(ThreadMessage),
    Termination(TerminationEvent),
}
