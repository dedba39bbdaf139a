//! File configuration loading for the demo host

mod file_config;
mod loader;

pub use file_config::{
    ConversationConfig, FileConfig, LogConfig, ParticipantConfig, StrategyKind,
};
pub use loader::ConfigLoader;
