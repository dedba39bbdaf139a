//! Round-robin speaker selection

use async_trait::async_trait;

use crate::chat::message::ThreadMessage;

use super::{SelectionError, SpeakerSelection, SpeakerSelector};

/// Cycles through the participants in registration order, one speaker per
/// round, wrapping around indefinitely.
#[derive(Debug, Clone)]
pub struct RoundRobinSelector {
    names: Vec<String>,
    next: usize,
}

impl RoundRobinSelector {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            next: 0,
        }
    }
}

#[async_trait]
impl SpeakerSelector for RoundRobinSelector {
    async fn select(
        &mut self,
        _thread: &[ThreadMessage],
    ) -> Result<SpeakerSelection, SelectionError> {
        if self.names.is_empty() {
            return Err(SelectionError::new("no participants to select from"));
        }
        let name = self.names[self.next % self.names.len()].clone();
        self.next = (self.next + 1) % self.names.len();
        Ok(SpeakerSelection::One(name))
    }

    async fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_through_participants_and_wraps() {
        let mut selector = RoundRobinSelector::new(["a", "b", "c"]);
        let mut picks = Vec::new();
        for _ in 0..4 {
            picks.push(selector.select(&[]).await.unwrap().into_names());
        }
        assert_eq!(
            picks,
            vec![
                vec!["a".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()],
                vec!["a".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn reset_starts_the_cycle_over() {
        let mut selector = RoundRobinSelector::new(["a", "b"]);
        selector.select(&[]).await.unwrap();
        selector.reset().await;
        let pick = selector.select(&[]).await.unwrap();
        assert_eq!(pick, SpeakerSelection::One("a".to_string()));
    }

    #[tokio::test]
    async fn empty_roster_is_a_selection_error() {
        let mut selector = RoundRobinSelector::new(Vec::<String>::new());
        assert!(selector.select(&[]).await.is_err());
    }
}
