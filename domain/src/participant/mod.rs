//! Participant roster: topics, names, descriptions

pub mod registry;
