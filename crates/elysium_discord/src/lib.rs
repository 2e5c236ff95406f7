//! Elysium Discord - gateway shell for the knowledge bot
//!
//! Wires the core chat service to serenity: prefix commands and slash
//! commands, typing indicators, chunked delivery under the message-size
//! ceiling, and the daily conversation sweep.

pub mod bot;
pub mod commands;
pub mod error;

pub use bot::{ElysiumBot, run_discord_bot};
pub use error::{DiscordError, Result};

// Re-export serenity for convenience
pub use serenity;
