use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// No credential was available at startup. Permanent for the session.
    #[error("API_KEY environment variable is not set. Please configure it to use the chat.")]
    CredentialMissing,

    /// Building the conversation handle failed. Permanent for the session.
    #[error("Failed to initialize AI: {0}")]
    SetupFailed(String),

    /// Opening the stream or reading from it failed. Recovered per exchange.
    #[error("{0}")]
    Transport(String),
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether the error disables chat for the rest of the session.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::CredentialMissing | Self::SetupFailed(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::transport(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            ChatError::transport(format!("Connection failed: {err}"))
        } else {
            ChatError::transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::transport(format!("Malformed response: {err}"))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
