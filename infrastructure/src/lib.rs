//! Infrastructure layer for colloquy
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: an in-process message bus, scripted demo
//! participants, a JSONL transcript logger, and configuration file
//! loading.

pub mod bus;
pub mod config;
pub mod logging;
pub mod participant;

// Re-export commonly used types
pub use bus::{BusDelivery, LocalChatBus, TopicSubscription, attach_coordinator};
pub use config::{ConfigLoader, FileConfig, ParticipantConfig, StrategyKind};
pub use logging::JsonlConversationLogger;
pub use participant::ScriptedParticipant;
