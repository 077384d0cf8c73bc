use std::fmt;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    User,
    Ai,
}

/// Opaque message identifier. Never reused within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub const GREETING: &'static str = "initial-ai-greeting";

    pub fn greeting() -> Self {
        Self(Self::GREETING.to_string())
    }

    pub fn user() -> Self {
        Self::with_prefix("user")
    }

    pub fn ai() -> Self {
        Self::with_prefix("ai")
    }

    pub fn ai_error() -> Self {
        Self::with_prefix("ai-error")
    }

    fn with_prefix(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub is_streaming: bool,
    pub timestamp: OffsetDateTime,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageId::user(), text, Sender::User)
    }

    /// Empty AI message that chunks are appended to while the reply streams in.
    pub fn placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(MessageId::ai(), String::new(), Sender::Ai)
        }
    }

    pub fn greeting(text: impl Into<String>) -> Self {
        Self::new(MessageId::greeting(), text, Sender::Ai)
    }

    pub fn ai_error(description: &str) -> Self {
        Self::new(
            MessageId::ai_error(),
            format!("Sorry, I encountered an error: {description}"),
            Sender::Ai,
        )
    }

    fn new(id: MessageId, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            is_streaming: false,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
