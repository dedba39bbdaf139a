//! Speaker selection strategy contract
//!
//! Different strategies can be plugged in to change who speaks next.
//! The coordinator, not the selector, validates that every returned name
//! exists in the participant registry.

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::message::ThreadMessage;

mod keyword;
mod round_robin;

pub use keyword::KeywordSelector;
pub use round_robin::RoundRobinSelector;

/// The speaker(s) chosen for the next round.
///
/// A strategy that picks one participant returns [`One`](Self::One); the
/// coordinator normalizes it into a one-element list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerSelection {
    One(String),
    Many(Vec<String>),
}

impl SpeakerSelection {
    /// Normalize into an ordered list of names.
    pub fn into_names(self) -> Vec<String> {
        match self {
            SpeakerSelection::One(name) => vec![name],
            SpeakerSelection::Many(names) => names,
        }
    }
}

impl From<String> for SpeakerSelection {
    fn from(name: String) -> Self {
        SpeakerSelection::One(name)
    }
}

impl From<Vec<String>> for SpeakerSelection {
    fn from(names: Vec<String>) -> Self {
        SpeakerSelection::Many(names)
    }
}

/// The selection strategy failed to produce a decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("speaker selection failed: {0}")]
pub struct SelectionError(pub String);

impl SelectionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Strategy choosing the next speaker(s) from the conversation thread.
///
/// `select` may be long-running (a model call in realistic deployments);
/// the coordinator races it against the conversation's cancellation
/// context, so implementations need no cancellation plumbing of their own
/// but must not corrupt state if their future is dropped mid-flight.
#[async_trait]
pub trait SpeakerSelector: Send {
    async fn select(&mut self, thread: &[ThreadMessage]) -> Result<SpeakerSelection, SelectionError>;

    /// Reset hook invoked when the conversation is reset.
    async fn reset(&mut self) {}
}
