//! Elysium Core - knowledge-grounded chat with executable knowledge blocks
//!
//! This crate owns everything below the transport: the chat service that
//! tracks per-user conversations and usage statistics, the on-disk knowledge
//! store that grounds model prompts, and the response post-processing
//! pipeline that extracts marked code fragments from model output, runs them
//! in an isolated subprocess, and splices the execution reports back into the
//! final message.
//!
//! # Security
//!
//! [`execute::SubprocessExecutor`] hands fragment text to a general-purpose
//! interpreter with the caller's working directory and environment. This is
//! arbitrary code execution by construction. Deployments must treat the
//! knowledge base (and anything the model can be coaxed into emitting between
//! the markers) as trusted input, or swap in a sandboxed [`execute::CodeExecutor`].

pub mod chunk;
pub mod config;
pub mod conversation;
pub mod error;
pub mod execute;
pub mod extract;
pub mod knowledge;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod stats;

pub use chunk::{DISCORD_CHUNK_LIMIT, chunk_message};
pub use config::{
    ChatSettings, Config, DiscordSettings, ExecutorSettings, KnowledgeSettings, ModelSettings,
};
pub use conversation::{ChatTurn, Conversation, TurnRole};
pub use error::{CoreError, Result};
pub use execute::{CodeExecutor, ExecutionOutcome, ExecutionReport, SubprocessExecutor};
pub use extract::{Fragment, FragmentExtractor, strip_code_fence};
pub use knowledge::KnowledgeStore;
pub use model::{ChatModel, GenAiChatModel};
pub use pipeline::{ProcessedResponse, ResponsePipeline, reassemble};
pub use service::{ChatService, spawn_daily_reset};
pub use stats::{StatsSnapshot, UsageStats};
