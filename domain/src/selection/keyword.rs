//! Content-driven speaker selection
//!
//! Matches words of the latest chat message against participant
//! descriptions and picks the best-scoring participant, falling back to
//! round-robin order when nothing matches.

use async_trait::async_trait;

use crate::chat::message::ThreadMessage;
use crate::participant::registry::ParticipantProfile;

use super::{SelectionError, SpeakerSelection, SpeakerSelector};

/// Selects the participant whose description shares the most words with
/// the last chat message in the thread.
#[derive(Debug, Clone)]
pub struct KeywordSelector {
    profiles: Vec<ParticipantProfile>,
    fallback_next: usize,
}

impl KeywordSelector {
    pub fn new(profiles: Vec<ParticipantProfile>) -> Self {
        Self {
            profiles,
            fallback_next: 0,
        }
    }

    fn score(description: &str, message: &str) -> usize {
        let description = description.to_lowercase();
        message
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.len() > 2 && description.contains(word))
            .count()
    }

    fn fallback(&mut self) -> Result<String, SelectionError> {
        if self.profiles.is_empty() {
            return Err(SelectionError::new("no participants to select from"));
        }
        let name = self.profiles[self.fallback_next % self.profiles.len()]
            .name
            .clone();
        self.fallback_next = (self.fallback_next + 1) % self.profiles.len();
        Ok(name)
    }
}

#[async_trait]
impl SpeakerSelector for KeywordSelector {
    async fn select(
        &mut self,
        thread: &[ThreadMessage],
    ) -> Result<SpeakerSelection, SelectionError> {
        let last_content = thread
            .iter()
            .rev()
            .find(|m| m.is_chat())
            .and_then(|m| m.content());

        if let Some(content) = last_content {
            let best = self
                .profiles
                .iter()
                .map(|p| (Self::score(&p.description, content), &p.name))
                .filter(|(score, _)| *score > 0)
                .max_by_key(|(score, _)| *score);
            if let Some((_, name)) = best {
                return Ok(SpeakerSelection::One(name.clone()));
            }
        }

        self.fallback().map(SpeakerSelection::One)
    }

    async fn reset(&mut self) {
        self.fallback_next = 0;
    }
}
