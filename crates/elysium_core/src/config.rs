use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use tracing::info;

use crate::{
    chunk::DISCORD_CHUNK_LIMIT,
    error::{CoreError, Result},
};

/// Main configuration for Elysium
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord bot configuration
    pub discord: DiscordSettings,
    /// Language model configuration
    pub model: ModelSettings,
    /// Knowledge base configuration
    pub knowledge: KnowledgeSettings,
    /// Fragment executor configuration
    pub executor: ExecutorSettings,
    /// Chat pipeline configuration
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    /// Discord bot token (overridden by DISCORD_TOKEN)
    pub token: String,
    /// Prefix for text commands
    pub prefix: String,
    /// Discord application ID
    pub application_id: Option<u64>,
    /// User IDs allowed to run knowledge-base admin commands
    pub admin_users: Vec<String>,
    /// Maximum characters per outbound message chunk
    pub max_message_length: usize,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            prefix: "!".to_string(),
            application_id: None,
            admin_users: Vec::new(),
            max_message_length: DISCORD_CHUNK_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model identifier passed to genai (API keys come from the environment)
    pub model: String,
    /// Sampling temperature; low for precise doc-grounded answers
    pub temperature: Option<f64>,
    /// Optional completion token cap
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            temperature: Some(0.1),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Directory holding `<name>.txt` knowledge documents
    pub directory: String,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            directory: "knowledge_base".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Interpreter invoked as `<interpreter> -c <code>`
    pub interpreter: String,
    /// Wall-clock bound for one fragment execution
    pub timeout_secs: u64,
    /// Preview bound for captured stdout, in characters
    pub stdout_preview: usize,
    /// Preview bound for captured stderr, in characters
    pub stderr_preview: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 10,
            stdout_preview: 500,
            stderr_preview: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Literal marker opening an executable block in model output
    pub start_marker: String,
    /// Literal marker closing an executable block
    pub end_marker: String,
    /// UTC wall-clock time (HH:MM) of the daily conversation sweep
    pub daily_reset_time: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            start_marker: "%%PYTHON_EXECUTE_BLOCK_START%%".to_string(),
            end_marker: "%%PYTHON_EXECUTE_BLOCK_END%%".to_string(),
            daily_reset_time: "06:00".to_string(),
        }
    }
}

impl ChatSettings {
    pub fn reset_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_reset_time, "%H:%M").map_err(|_| {
            CoreError::InvalidResetTime {
                value: self.daily_reset_time.clone(),
            }
        })
    }
}

impl Config {
    /// Load configuration from `ELYSIUM_CONFIG` (or `./elysium.toml`), then
    /// apply environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = env::var("ELYSIUM_CONFIG").unwrap_or_else(|_| "elysium.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| CoreError::ConfigRead {
                path: path.clone(),
                source,
            })?;
            let config: Config =
                toml::from_str(&raw).map_err(|source| CoreError::ConfigParse {
                    path: path.clone(),
                    source,
                })?;
            info!("loaded configuration from {path}");
            config
        } else {
            info!("no config file at {path}, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Ok(app_id) = env::var("DISCORD_APPLICATION_ID")
            && let Ok(app_id) = app_id.parse()
        {
            self.discord.application_id = Some(app_id);
        }
        if let Ok(dir) = env::var("ELYSIUM_KNOWLEDGE_DIR") {
            self.knowledge.directory = dir;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.token.is_empty() {
            return Err(CoreError::MissingToken);
        }
        if self.discord.max_message_length == 0 {
            return Err(CoreError::InvalidMessageLength {
                value: self.discord.max_message_length,
            });
        }
        if self.chat.start_marker.is_empty() || self.chat.end_marker.is_empty() {
            return Err(CoreError::EmptyMarker);
        }
        self.chat.reset_time()?;
        Ok(())
    }
}
