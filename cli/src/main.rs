//! CLI entrypoint for colloquy
//!
//! Wires the layers together for a demo conversation: an in-process bus,
//! scripted participants from configuration, and a group chat coordinator
//! whose output stream is printed until the termination event.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use colloquy_application::{ChatBus, ChatEvent, ChatOutput, GroupChatCoordinator};
use colloquy_domain::{
    AgentEvent, ChatMessage, KeywordSelector, ParticipantProfile, RoundRobinSelector,
    SpeakerSelector, TextMentionTermination, ThreadMessage, TopicId,
};
use colloquy_infrastructure::{
    ConfigLoader, JsonlConversationLogger, LocalChatBus, ParticipantConfig, ScriptedParticipant,
    StrategyKind, attach_coordinator,
};

#[derive(Parser)]
#[command(name = "colloquy", about = "Multi-party conversation coordinator demo")]
struct Cli {
    /// Task that opens the conversation
    task: Option<String>,

    /// Path to a configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many completed turns
    #[arg(long)]
    max_turns: Option<u32>,

    /// Stop once a message mentions this text
    #[arg(long)]
    stop_phrase: Option<String>,

    /// Speaker selection strategy (round-robin, keyword)
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Also print speaker selection events
    #[arg(long)]
    show_selection: bool,

    /// Write a JSONL transcript to this path
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Suppress conversation output
    #[arg(short, long)]
    quiet: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = ConfigLoader::load(cli.config.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    // CLI flags override file configuration
    if let Some(max_turns) = cli.max_turns {
        config.conversation.max_turns = Some(max_turns);
    }
    if let Some(stop_phrase) = cli.stop_phrase {
        config.conversation.stop_phrase = Some(stop_phrase);
    }
    if let Some(strategy) = cli.strategy {
        config.conversation.strategy = strategy;
    }
    if cli.show_selection {
        config.conversation.emit_speaker_events = true;
    }
    if let Some(path) = cli.transcript {
        config.log.path = Some(path);
    }
    if config.participants.is_empty() {
        config.participants = demo_roster();
    }
    if config.conversation.max_turns.is_none() && config.conversation.stop_phrase.is_none() {
        // Keep the demo bounded even when nothing is configured.
        config.conversation.max_turns = Some(8);
        config.conversation.stop_phrase = Some("TERMINATE".to_string());
    }

    let Some(task) = cli.task else {
        bail!("a task is required, e.g.: colloquy \"Plan the release\"");
    };

    // === Dependency Injection ===
    let bus = LocalChatBus::new();
    let group_topic = TopicId::new("room");
    let coordinator_topic = TopicId::new("coordinator");

    let mut builder = GroupChatCoordinator::builder("colloquy")
        .group_topic(group_topic.clone())
        .emit_speaker_events(config.conversation.emit_speaker_events);

    for participant in &config.participants {
        let topic = TopicId::new(format!("participant/{}", participant.name));
        builder = builder.participant(
            participant.name.as_str(),
            topic.clone(),
            participant.description.as_str(),
        );
        ScriptedParticipant::new(participant.name.as_str(), participant.responses.clone()).spawn(
            &bus,
            topic,
            group_topic.clone(),
            coordinator_topic.clone(),
        );
    }

    if let Some(max_turns) = config.conversation.max_turns {
        builder = builder.max_turns(max_turns);
    }
    if let Some(stop_phrase) = &config.conversation.stop_phrase {
        builder = builder
            .termination_condition(Box::new(TextMentionTermination::new(stop_phrase.clone())));
    }
    if let Some(path) = &config.log.path
        && let Some(logger) = JsonlConversationLogger::new(path)
    {
        info!("writing transcript to {}", logger.path().display());
        builder = builder.conversation_logger(Arc::new(logger));
    }

    let selector: Box<dyn SpeakerSelector> = match config.conversation.strategy {
        StrategyKind::RoundRobin => Box::new(RoundRobinSelector::new(
            config.participants.iter().map(|p| p.name.clone()),
        )),
        StrategyKind::Keyword => Box::new(KeywordSelector::new(
            config
                .participants
                .iter()
                .map(|p| ParticipantProfile {
                    name: p.name.clone(),
                    description: p.description.clone(),
                })
                .collect(),
        )),
    };

    let subscription = bus.subscribe(coordinator_topic.clone());
    let (mut coordinator, mut output) = builder.build(bus.clone(), selector)?;

    if let Some(mut faults) = coordinator.take_faults() {
        tokio::spawn(async move {
            while let Some(fault) = faults.recv().await {
                tracing::error!(error = %fault, "conversation fault");
            }
        });
    }

    let coordinator = Arc::new(coordinator);
    let _pump = attach_coordinator(subscription, Arc::clone(&coordinator));

    // Ctrl-C cancels the run without tearing the process down mid-write.
    let run_token = CancellationToken::new();
    tokio::spawn({
        let run_token = run_token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("cancelling the conversation run");
                run_token.cancel();
            }
        }
    });

    if !cli.quiet {
        println!();
        println!("Task: {}", task);
        println!(
            "Participants: {}",
            config
                .participants
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }

    bus.publish(
        &coordinator_topic,
        ChatEvent::Start {
            messages: vec![ChatMessage::user(task)],
            output_task_messages: true,
        },
        &run_token,
    )
    .await?;

    let mut failed = false;
    while let Some(item) = output.next().await {
        match item {
            ChatOutput::Message(ThreadMessage::Event(AgentEvent::SpeakerSelected {
                speakers,
                ..
            })) => {
                if !cli.quiet {
                    println!("  -> next: {}", speakers.join(", "));
                }
            }
            ChatOutput::Message(message) => {
                if !cli.quiet
                    && let Some(content) = message.content()
                {
                    println!("[{}] {}", message.source(), content);
                }
            }
            ChatOutput::Termination(termination) => {
                if let Some(error) = &termination.error {
                    eprintln!("Conversation failed: {}", error);
                    failed = true;
                }
                if !cli.quiet {
                    println!();
                    println!("Stopped: {}", termination.message.content);
                }
                break;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Built-in two-party roster used when no configuration provides one.
fn demo_roster() -> Vec<ParticipantConfig> {
    vec![
        ParticipantConfig {
            name: "planner".to_string(),
            description: "Breaks the task into concrete steps".to_string(),
            responses: vec![
                "Step 1: agree on scope. Step 2: assign owners.".to_string(),
                "Scope agreed and owners assigned. Over to review.".to_string(),
            ],
        },
        ParticipantConfig {
            name: "critic".to_string(),
            description: "Reviews plans and raises risks".to_string(),
            responses: vec![
                "The plan is missing a rollback path; please add one.".to_string(),
                "Rollback covered. The plan looks complete. TERMINATE".to_string(),
            ],
        },
    ]
}
