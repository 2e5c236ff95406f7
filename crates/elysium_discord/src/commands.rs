//! Slash command definitions and embed builders shared by both the prefix
//! and interaction paths.

use elysium_core::stats::{StatsSnapshot, TopUser};
use serenity::{
    builder::{CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter},
    model::{application::CommandOptionType, colour::Colour},
};

/// Sent instead of detail when the model call fails; the detail goes to logs.
pub const APOLOGY: &str = "⚠️ Sorry, I couldn't generate a response. Please try again in a moment.";

pub const NOT_ADMIN: &str = "🚫 You are not authorized to manage the knowledge base.";

/// Create all slash commands for registration, paired with their names so
/// registration failures can say which command was rejected.
pub fn create_commands() -> Vec<(&'static str, CreateCommand)> {
    vec![
        (
            "ask",
            CreateCommand::new("ask")
                .description("Ask the AI a question grounded in the knowledge base")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "question", "Your question")
                        .required(true),
                ),
        ),
        (
            "reset_chat",
            CreateCommand::new("reset_chat")
                .description("Reset your conversation history with the AI"),
        ),
        (
            "kb_list",
            CreateCommand::new("kb_list").description("List all knowledge base documents"),
        ),
        (
            "kb_add",
            CreateCommand::new("kb_add")
                .description("Add a knowledge base document from a .txt attachment (admin)")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Document name")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Attachment,
                        "file",
                        "The .txt file with the document content",
                    )
                    .required(true),
                ),
        ),
        (
            "kb_remove",
            CreateCommand::new("kb_remove")
                .description("Remove a knowledge base document (admin)")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Document name")
                        .required(true),
                ),
        ),
        (
            "kb_reload",
            CreateCommand::new("kb_reload")
                .description("Reload all knowledge base documents from disk (admin)"),
        ),
        (
            "stats",
            CreateCommand::new("stats").description("Show bot usage statistics"),
        ),
    ]
}

/// Embed listing every knowledge document with size and preview.
pub fn kb_list_embed(entries: &[(String, usize, String)]) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Knowledge Base Documents")
        .description("Documents currently grounding the bot's answers:")
        .colour(Colour::BLUE);

    for (name, size, preview) in entries {
        embed = embed.field(
            name,
            format!("Size: {size} chars\nPreview: {preview}"),
            false,
        );
    }
    embed
}

/// Embed rendering a usage-stats snapshot for the status surface.
pub fn stats_embed(snapshot: &StatsSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Usage Statistics")
        .colour(Colour::DARK_GREEN)
        .field(
            "Totals",
            format!(
                "Questions: {}\nConversation resets: {}\nExecutions: {} ({} failed)",
                snapshot.questions_asked,
                snapshot.conversations_reset,
                snapshot.executions_attempted,
                snapshot.execution_errors,
            ),
            false,
        )
        .field(
            "Current",
            format!(
                "Active conversations: {}\nKnowledge documents: {}",
                snapshot.active_conversations, snapshot.document_count,
            ),
            false,
        );

    if !snapshot.document_names.is_empty() {
        embed = embed.field("Documents", snapshot.document_names.join(", "), false);
    }

    if !snapshot.top_users.is_empty() {
        let lines = snapshot
            .top_users
            .iter()
            .map(top_user_line)
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Top Users", lines, false);
    }

    embed.footer(CreateEmbedFooter::new("Counters reset when the bot restarts"))
}

fn top_user_line(user: &TopUser) -> String {
    format!(
        "**{}**: {} question(s), last: {}",
        user.username,
        user.question_count,
        user.last_question.as_deref().unwrap_or("n/a"),
    )
}
