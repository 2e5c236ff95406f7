use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Model call failed")]
    #[diagnostic(
        code(elysium_core::model_call_failed),
        help("Check API credentials and rate limits for model '{model}'")
    )]
    ModelCallFailed {
        model: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model returned no usable content")]
    #[diagnostic(
        code(elysium_core::empty_model_response),
        help("The model '{model}' replied without any text content")
    )]
    EmptyModelResponse { model: String },

    #[error("Knowledge store I/O failed")]
    #[diagnostic(
        code(elysium_core::knowledge_io),
        help("Check that the knowledge directory exists and is writable")
    )]
    KnowledgeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid knowledge document name: '{name}'")]
    #[diagnostic(
        code(elysium_core::invalid_document_name),
        help("Document names may only contain ASCII letters, digits, '-' and '_'")
    )]
    InvalidDocumentName { name: String },

    #[error("Failed to read config file")]
    #[diagnostic(
        code(elysium_core::config_read),
        help("Check that '{path}' exists and is readable")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file")]
    #[diagnostic(code(elysium_core::config_parse), help("Check the TOML syntax in '{path}'"))]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Executable block markers must not be empty")]
    #[diagnostic(
        code(elysium_core::empty_marker),
        help("Set non-empty [chat].start_marker and [chat].end_marker values")
    )]
    EmptyMarker,

    #[error("Invalid max message length: {value}")]
    #[diagnostic(
        code(elysium_core::invalid_message_length),
        help("[discord].max_message_length must be at least 1")
    )]
    InvalidMessageLength { value: usize },

    #[error("Invalid daily reset time: '{value}'")]
    #[diagnostic(
        code(elysium_core::invalid_reset_time),
        help("Use 24-hour HH:MM format, e.g. \"06:00\"")
    )]
    InvalidResetTime { value: String },

    #[error("No Discord token configured")]
    #[diagnostic(
        code(elysium_core::missing_token),
        help("Set DISCORD_TOKEN in the environment or [discord].token in elysium.toml")
    )]
    MissingToken,
}

impl CoreError {
    pub fn model_call_failed(
        model: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelCallFailed {
            model: model.into(),
            cause: Box::new(cause),
        }
    }

    pub fn knowledge_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::KnowledgeIo {
            path: path.into(),
            source,
        }
    }
}
