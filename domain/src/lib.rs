//! Domain layer for colloquy
//!
//! This crate contains the conversation entities and the pluggable
//! strategy contracts of the group chat coordinator. It has no
//! dependencies on infrastructure or runtime concerns.
//!
//! # Core Concepts
//!
//! ## Thread and Rounds
//!
//! A conversation is an append-only [`MessageThread`]. A *round* starts
//! when the coordinator asks one or more participants to speak and ends
//! when all of them have answered; a completed round is a *turn*.
//!
//! ## Pluggable strategies
//!
//! - [`SpeakerSelector`]: who speaks next, given the thread
//! - [`TerminationCondition`]: when the conversation stops
//! - [`GroupStateValidator`]: whether a start request is acceptable

pub mod chat;
pub mod core;
pub mod participant;
pub mod selection;
pub mod termination;

// Re-export commonly used types
pub use chat::{
    message::{AgentEvent, ChatMessage, StopMessage, ThreadMessage},
    response::ChatResponse,
    thread::MessageThread,
    validation::{AcceptingValidator, GroupStateValidator, ValidationError},
};
pub use core::error::ConfigurationError;
pub use participant::registry::{ParticipantProfile, ParticipantRegistry, TopicId};
pub use selection::{
    KeywordSelector, RoundRobinSelector, SelectionError, SpeakerSelection, SpeakerSelector,
};
pub use termination::{
    AnyTermination, MaxMessageTermination, TerminationCondition, TerminationError,
    TextMentionTermination,
};
