//! File configuration schema for the demo host

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root of `colloquy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub conversation: ConversationConfig,
    pub participants: Vec<ParticipantConfig>,
    pub log: LogConfig,
}

/// `[conversation]` section: termination policy and output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Stop after this many completed turns (unset = no turn limit).
    pub max_turns: Option<u32>,
    /// Stop once a message mentions this text.
    pub stop_phrase: Option<String>,
    /// Also stream speaker selection events to the output.
    pub emit_speaker_events: bool,
    /// Speaker selection strategy.
    pub strategy: StrategyKind,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            stop_phrase: None,
            emit_speaker_events: false,
            strategy: StrategyKind::RoundRobin,
        }
    }
}

/// Built-in speaker selection strategies selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    RoundRobin,
    Keyword,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" | "rr" => Ok(StrategyKind::RoundRobin),
            "keyword" | "kw" => Ok(StrategyKind::Keyword),
            other => Err(format!(
                "unknown strategy '{}', expected 'round-robin' or 'keyword'",
                other
            )),
        }
    }
}

/// `[[participants]]` entries: roster plus scripted demo responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Lines replayed one per respond-now request.
    #[serde(default)]
    pub responses: Vec<String>,
}

/// `[log]` section: transcript output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// JSONL transcript path; unset disables transcript logging.
    pub path: Option<PathBuf>,
}
