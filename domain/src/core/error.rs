//! Construction-time error types

use thiserror::Error;

/// Errors detected while assembling a group chat, before any message is
/// processed. All of these are fatal: a coordinator with an invalid
/// participant roster or turn limit is never instantiated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("the maximum number of turns must be greater than 0")]
    NonPositiveMaxTurns,

    #[error("participant names, topics, and descriptions must have the same length")]
    LengthMismatch,

    #[error("participant topic '{0}' is not unique")]
    DuplicateTopic(String),

    #[error("participant name '{0}' is not unique")]
    DuplicateName(String),

    #[error("the group topic '{0}' must not be a participant topic")]
    GroupTopicCollision(String),

    #[error("at least one participant is required")]
    NoParticipants,
}
