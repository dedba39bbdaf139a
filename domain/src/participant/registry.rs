//! Participant roster and topic mapping
//!
//! The registry is built once at construction from parallel name / topic /
//! description arrays and validated eagerly: a coordinator never runs with
//! a roster that violates the topic uniqueness or disjointness invariants.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigurationError;

/// Addressable destination on the message bus.
///
/// Directed topics belong to a single participant; the group topic is the
/// shared broadcast destination visible to every participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TopicId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TopicId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Display name and description of one participant, for selectors that
/// reason over who can contribute what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProfile {
    pub name: String,
    pub description: String,
}

/// Immutable mapping participant-name -> private topic (Entity)
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    profiles: Vec<ParticipantProfile>,
    topic_by_name: HashMap<String, TopicId>,
    group_topic: TopicId,
}

impl ParticipantRegistry {
    /// Build and validate the roster.
    ///
    /// `names`, `topics`, and `descriptions` are parallel arrays; the
    /// invariants checked here are exactly the construction-time rules:
    /// equal lengths, pairwise-unique topics and names, and a group topic
    /// disjoint from all participant topics.
    pub fn new(
        names: Vec<String>,
        topics: Vec<TopicId>,
        descriptions: Vec<String>,
        group_topic: TopicId,
    ) -> Result<Self, ConfigurationError> {
        if names.len() != topics.len() || names.len() != descriptions.len() {
            return Err(ConfigurationError::LengthMismatch);
        }
        if names.is_empty() {
            return Err(ConfigurationError::NoParticipants);
        }

        let mut topic_by_name = HashMap::with_capacity(names.len());
        let mut seen_topics = HashMap::with_capacity(topics.len());
        for (name, topic) in names.iter().zip(topics.iter()) {
            if seen_topics.insert(topic.clone(), ()).is_some() {
                return Err(ConfigurationError::DuplicateTopic(topic.to_string()));
            }
            if topic == &group_topic {
                return Err(ConfigurationError::GroupTopicCollision(
                    group_topic.to_string(),
                ));
            }
            if topic_by_name.insert(name.clone(), topic.clone()).is_some() {
                return Err(ConfigurationError::DuplicateName(name.clone()));
            }
        }

        let profiles = names
            .into_iter()
            .zip(descriptions)
            .map(|(name, description)| ParticipantProfile { name, description })
            .collect();

        Ok(Self {
            profiles,
            topic_by_name,
            group_topic,
        })
    }

    /// The private topic of a participant, if registered.
    pub fn topic_of(&self, name: &str) -> Option<&TopicId> {
        self.topic_by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.topic_by_name.contains_key(name)
    }

    pub fn group_topic(&self) -> &TopicId {
        &self.group_topic
    }

    /// Participant profiles in registration order.
    pub fn profiles(&self) -> &[ParticipantProfile] {
        &self.profiles
    }

    /// Participant names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
