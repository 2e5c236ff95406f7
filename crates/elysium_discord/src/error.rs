use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Failed to build Discord client")]
    #[diagnostic(
        code(elysium::discord::client_build_failed),
        help("Check that the Discord bot token is valid and has not been regenerated")
    )]
    ClientBuildFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Discord gateway connection failed")]
    #[diagnostic(
        code(elysium::discord::gateway_failed),
        help("Check network access and that the required gateway intents are enabled")
    )]
    GatewayFailed {
        #[source]
        cause: serenity::Error,
    },

    #[error("Message send failed")]
    #[diagnostic(
        code(elysium::discord::message_send_failed),
        help("Failed to send message to {destination}; check channel permissions")
    )]
    MessageSendFailed {
        destination: String,
        #[source]
        cause: serenity::Error,
    },

    #[error("Command registration failed")]
    #[diagnostic(
        code(elysium::discord::command_registration_failed),
        help("Failed to register slash command '{command_name}'")
    )]
    CommandRegistrationFailed {
        command_name: String,
        #[source]
        cause: serenity::Error,
    },
}

impl DiscordError {
    pub fn message_send_failed(destination: impl Into<String>, cause: serenity::Error) -> Self {
        Self::MessageSendFailed {
            destination: destination.into(),
            cause,
        }
    }
}
