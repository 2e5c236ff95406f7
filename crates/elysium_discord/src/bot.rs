//! Serenity event handler wiring the chat service to Discord.
//!
//! Every command is reachable two ways: as a prefix command in any channel
//! the bot can read, and as a global slash command. Both paths funnel into
//! the same [`ChatService`] calls so behavior stays identical.

use std::sync::Arc;

use elysium_core::{ChatService, DiscordSettings, chunk_message};
use serenity::{
    all::{
        ActivityData, Command, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse,
    },
    async_trait,
    client::{Context, EventHandler},
    model::{
        application::{CommandInteraction, Interaction},
        channel::{Attachment, Message},
        gateway::Ready,
    },
    prelude::*,
};
use tracing::{debug, error, info, warn};

use crate::commands::{APOLOGY, NOT_ADMIN, create_commands, kb_list_embed, stats_embed};
use crate::error::{DiscordError, Result};

/// Discord bot handler
pub struct ElysiumBot {
    service: Arc<ChatService>,
    settings: DiscordSettings,
}

impl ElysiumBot {
    pub fn new(service: Arc<ChatService>, settings: DiscordSettings) -> Self {
        Self { service, settings }
    }

    fn is_admin(&self, user_id: &str) -> bool {
        self.settings
            .admin_users
            .iter()
            .any(|admin| admin == user_id)
    }

    fn chunk_limit(&self) -> usize {
        self.settings.max_message_length
    }
}

/// Split `content` into a prefix command name and its argument remainder.
///
/// Returns `None` when the message does not start with the prefix or names
/// no command at all.
fn parse_prefix_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = content.strip_prefix(prefix)?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    match rest.split_once(char::is_whitespace) {
        Some((command, args)) => Some((command, args.trim())),
        None => Some((rest, "")),
    }
}

#[async_trait]
impl EventHandler for ElysiumBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            "{} is connected, serving model {}",
            ready.user.name,
            self.service.model_name()
        );

        ctx.set_activity(Some(ActivityData::listening(format!(
            "{p}ask | {p}reset_chat",
            p = self.settings.prefix
        ))));

        for (name, command) in create_commands() {
            if let Err(why) = Command::create_global_command(&ctx.http, command).await {
                let err = DiscordError::CommandRegistrationFailed {
                    command_name: name.to_string(),
                    cause: why,
                };
                error!("Cannot create slash command: {:?}", err);
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some((command, args)) = parse_prefix_command(&msg.content, &self.settings.prefix)
        else {
            return;
        };

        debug!(
            "Prefix command '{}' from user {} ({})",
            command, msg.author.name, msg.author.id
        );

        let result = match command {
            "ask" => self.prefix_ask(&ctx, &msg, args).await,
            "reset_chat" => self.prefix_reset_chat(&ctx, &msg).await,
            "kb_list" => self.prefix_kb_list(&ctx, &msg).await,
            "kb_add" => self.prefix_kb_add(&ctx, &msg, args).await,
            "kb_remove" => self.prefix_kb_remove(&ctx, &msg, args).await,
            "kb_reload" => self.prefix_kb_reload(&ctx, &msg).await,
            "stats" => self.prefix_stats(&ctx, &msg).await,
            _ => return,
        };

        if let Err(e) = result {
            error!("Prefix command '{}' failed: {:?}", command, e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            info!(
                "Slash command '{}' from user {} ({})",
                command.data.name, command.user.name, command.user.id
            );
            match command.data.name.as_str() {
                "ask" => self.slash_ask(&ctx, &command).await,
                "reset_chat" => self.slash_reset_chat(&ctx, &command).await,
                "kb_list" => self.slash_kb_list(&ctx, &command).await,
                "kb_add" => self.slash_kb_add(&ctx, &command).await,
                "kb_remove" => self.slash_kb_remove(&ctx, &command).await,
                "kb_reload" => self.slash_kb_reload(&ctx, &command).await,
                "stats" => self.slash_stats(&ctx, &command).await,
                _ => {
                    warn!("Unknown command: {}", command.data.name);
                }
            }
        }
    }
}

// Prefix command handlers.
impl ElysiumBot {
    async fn prefix_ask(&self, ctx: &Context, msg: &Message, question: &str) -> Result<()> {
        if question.is_empty() {
            return self
                .reply(ctx, msg, format!("Usage: `{}ask <question>`", self.settings.prefix))
                .await;
        }

        let typing = msg.channel_id.start_typing(&ctx.http);
        let answer = self
            .service
            .ask(
                &msg.author.id.to_string(),
                &msg.author.name,
                question,
            )
            .await;
        typing.stop();

        match answer {
            Ok(text) => self.deliver_chunks(ctx, msg, &text).await,
            Err(e) => {
                error!("Model call failed for user {}: {:?}", msg.author.id, e);
                self.reply(ctx, msg, APOLOGY.to_string()).await
            }
        }
    }

    async fn prefix_reset_chat(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let text = if self
            .service
            .reset_conversation(&msg.author.id.to_string())
            .await
        {
            "🧹 Your conversation history has been reset.".to_string()
        } else {
            "You have no active conversation to reset.".to_string()
        };
        self.reply(ctx, msg, text).await
    }

    async fn prefix_kb_list(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let entries = self.service.knowledge().entries().await;
        if entries.is_empty() {
            return self
                .reply(ctx, msg, "The knowledge base is empty.".to_string())
                .await;
        }
        msg.channel_id
            .send_message(&ctx.http, CreateMessage::new().embed(kb_list_embed(&entries)))
            .await
            .map_err(|e| DiscordError::message_send_failed(msg.channel_id.to_string(), e))?;
        Ok(())
    }

    async fn prefix_kb_add(&self, ctx: &Context, msg: &Message, name: &str) -> Result<()> {
        if !self.is_admin(&msg.author.id.to_string()) {
            return self.reply(ctx, msg, NOT_ADMIN.to_string()).await;
        }
        if name.is_empty() {
            return self
                .reply(
                    ctx,
                    msg,
                    format!(
                        "Usage: `{}kb_add <name>` with a .txt file attached",
                        self.settings.prefix
                    ),
                )
                .await;
        }

        let Some(attachment) = msg
            .attachments
            .iter()
            .find(|a| a.filename.to_lowercase().ends_with(".txt"))
        else {
            return self
                .reply(ctx, msg, "Please attach a .txt file with the document content.".to_string())
                .await;
        };

        let text = self.add_document(name, attachment).await;
        self.reply(ctx, msg, text).await
    }

    async fn prefix_kb_remove(&self, ctx: &Context, msg: &Message, name: &str) -> Result<()> {
        if !self.is_admin(&msg.author.id.to_string()) {
            return self.reply(ctx, msg, NOT_ADMIN.to_string()).await;
        }
        if name.is_empty() {
            return self
                .reply(ctx, msg, format!("Usage: `{}kb_remove <name>`", self.settings.prefix))
                .await;
        }
        self.reply(ctx, msg, self.remove_document(name).await).await
    }

    async fn prefix_kb_reload(&self, ctx: &Context, msg: &Message) -> Result<()> {
        if !self.is_admin(&msg.author.id.to_string()) {
            return self.reply(ctx, msg, NOT_ADMIN.to_string()).await;
        }
        self.reply(ctx, msg, self.reload_documents().await).await
    }

    async fn prefix_stats(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let snapshot = self.service.stats_snapshot().await;
        msg.channel_id
            .send_message(&ctx.http, CreateMessage::new().embed(stats_embed(&snapshot)))
            .await
            .map_err(|e| DiscordError::message_send_failed(msg.channel_id.to_string(), e))?;
        Ok(())
    }

    async fn reply(&self, ctx: &Context, msg: &Message, text: String) -> Result<()> {
        msg.reply(&ctx.http, text)
            .await
            .map_err(|e| DiscordError::message_send_failed(msg.channel_id.to_string(), e))?;
        Ok(())
    }

    /// Send `text` in order: the first chunk as a reply, the rest as plain
    /// channel messages.
    async fn deliver_chunks(&self, ctx: &Context, msg: &Message, text: &str) -> Result<()> {
        let mut chunks = chunk_message(text, self.chunk_limit()).into_iter();
        if let Some(first) = chunks.next() {
            msg.reply(&ctx.http, first)
                .await
                .map_err(|e| DiscordError::message_send_failed(msg.channel_id.to_string(), e))?;
        }
        for chunk in chunks {
            msg.channel_id
                .say(&ctx.http, chunk)
                .await
                .map_err(|e| DiscordError::message_send_failed(msg.channel_id.to_string(), e))?;
        }
        Ok(())
    }
}

// Slash command handlers.
impl ElysiumBot {
    async fn slash_ask(&self, ctx: &Context, command: &CommandInteraction) {
        if !defer(ctx, command).await {
            return;
        }

        let question = option_str(command, "question").unwrap_or_default();
        let answer = self
            .service
            .ask(
                &command.user.id.to_string(),
                &command.user.name,
                question,
            )
            .await;

        let text = match answer {
            Ok(text) => text,
            Err(e) => {
                error!("Model call failed for user {}: {:?}", command.user.id, e);
                APOLOGY.to_string()
            }
        };

        let mut chunks = chunk_message(&text, self.chunk_limit()).into_iter();
        if let Some(first) = chunks.next() {
            if let Err(why) = command
                .edit_response(&ctx.http, EditInteractionResponse::new().content(first))
                .await
            {
                error!("Cannot edit deferred response: {:?}", why);
                return;
            }
        }
        for chunk in chunks {
            if let Err(why) = command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new().content(chunk),
                )
                .await
            {
                error!("Cannot send followup chunk: {:?}", why);
                return;
            }
        }
    }

    async fn slash_reset_chat(&self, ctx: &Context, command: &CommandInteraction) {
        let text = if self
            .service
            .reset_conversation(&command.user.id.to_string())
            .await
        {
            "🧹 Your conversation history has been reset."
        } else {
            "You have no active conversation to reset."
        };
        respond(ctx, command, text).await;
    }

    async fn slash_kb_list(&self, ctx: &Context, command: &CommandInteraction) {
        let entries = self.service.knowledge().entries().await;
        if entries.is_empty() {
            respond(ctx, command, "The knowledge base is empty.").await;
            return;
        }
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().embed(kb_list_embed(&entries)),
        );
        if let Err(why) = command.create_response(&ctx.http, response).await {
            error!("Cannot send kb_list response: {:?}", why);
        }
    }

    async fn slash_kb_add(&self, ctx: &Context, command: &CommandInteraction) {
        if !self.is_admin(&command.user.id.to_string()) {
            respond(ctx, command, NOT_ADMIN).await;
            return;
        }
        if !defer(ctx, command).await {
            return;
        }

        let name = option_str(command, "name").unwrap_or_default();
        let text = match option_attachment(command, "file") {
            Some(attachment) => self.add_document(name, attachment).await,
            None => "Please attach a .txt file with the document content.".to_string(),
        };
        edit_deferred(ctx, command, &text).await;
    }

    async fn slash_kb_remove(&self, ctx: &Context, command: &CommandInteraction) {
        if !self.is_admin(&command.user.id.to_string()) {
            respond(ctx, command, NOT_ADMIN).await;
            return;
        }
        let name = option_str(command, "name").unwrap_or_default();
        let text = self.remove_document(name).await;
        respond(ctx, command, &text).await;
    }

    async fn slash_kb_reload(&self, ctx: &Context, command: &CommandInteraction) {
        if !self.is_admin(&command.user.id.to_string()) {
            respond(ctx, command, NOT_ADMIN).await;
            return;
        }
        if !defer(ctx, command).await {
            return;
        }
        let text = self.reload_documents().await;
        edit_deferred(ctx, command, &text).await;
    }

    async fn slash_stats(&self, ctx: &Context, command: &CommandInteraction) {
        let snapshot = self.service.stats_snapshot().await;
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().embed(stats_embed(&snapshot)),
        );
        if let Err(why) = command.create_response(&ctx.http, response).await {
            error!("Cannot send stats response: {:?}", why);
        }
    }
}

// Knowledge-base operations shared by both paths.
impl ElysiumBot {
    async fn add_document(&self, name: &str, attachment: &Attachment) -> String {
        if !attachment.filename.to_lowercase().ends_with(".txt") {
            return "Only .txt attachments are accepted.".to_string();
        }

        let bytes = match attachment.download().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to download attachment '{}': {:?}", attachment.filename, e);
                return "Failed to download the attachment.".to_string();
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return "The attachment is not valid UTF-8 text.".to_string(),
        };

        match self.service.knowledge().add(name, &content).await {
            Ok(()) => {
                let chars = content.chars().count();
                info!("Added knowledge document '{}' ({} chars)", name, chars);
                format!("✅ Added document '{name}' ({chars} chars).")
            }
            Err(e) => {
                warn!("Failed to add document '{}': {:?}", name, e);
                format!("Could not add document: {e}")
            }
        }
    }

    async fn remove_document(&self, name: &str) -> String {
        match self.service.knowledge().remove(name).await {
            Ok(true) => {
                info!("Removed knowledge document '{}'", name);
                format!("🗑️ Removed document '{name}'.")
            }
            Ok(false) => format!("Document '{name}' not found."),
            Err(e) => {
                warn!("Failed to remove document '{}': {:?}", name, e);
                format!("Could not remove document: {e}")
            }
        }
    }

    async fn reload_documents(&self) -> String {
        match self.service.knowledge().reload().await {
            Ok(count) => {
                info!("Reloaded {} knowledge document(s)", count);
                format!("🔄 Reloaded {count} document(s) from disk.")
            }
            Err(e) => {
                error!("Failed to reload knowledge base: {:?}", e);
                format!("Could not reload the knowledge base: {e}")
            }
        }
    }
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_attachment<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a Attachment> {
    let id = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_attachment_id())?;
    command.data.resolved.attachments.get(&id)
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> bool {
    if let Err(why) = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await
    {
        error!("Cannot defer response: {:?}", why);
        return false;
    }
    true
}

async fn respond(ctx: &Context, command: &CommandInteraction, text: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(text),
    );
    if let Err(why) = command.create_response(&ctx.http, response).await {
        error!("Cannot send response: {:?}", why);
    }
}

async fn edit_deferred(ctx: &Context, command: &CommandInteraction, text: &str) {
    if let Err(why) = command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await
    {
        error!("Cannot edit deferred response: {:?}", why);
    }
}

/// Create and run the Discord bot until the gateway connection ends.
pub async fn run_discord_bot(settings: DiscordSettings, service: Arc<ChatService>) -> Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = ElysiumBot::new(service, settings.clone());

    let mut client_builder = Client::builder(&settings.token, intents).event_handler(handler);
    if let Some(app_id) = settings.application_id {
        client_builder = client_builder.application_id(app_id.into());
    }

    let mut client = client_builder
        .await
        .map_err(|e| DiscordError::ClientBuildFailed { cause: e })?;

    info!("Starting Discord bot...");
    client
        .start()
        .await
        .map_err(|e| DiscordError::GatewayFailed { cause: e })?;

    Ok(())
}
