//! Session start-up: one conversation handle per process, or none at all.

use crate::ai::{ChatError, ChatResult, ChatService, Conversation, GeminiService};
use crate::config::{APP_TITLE, Config, SYSTEM_PROMPT};
use crate::types::ChatMessage;
use once_cell::sync::Lazy;
use std::sync::Arc;

static GREETING: Lazy<String> =
    Lazy::new(|| format!("Hello! I'm {APP_TITLE}. How can I help you today?"));

/// Where the session stands. `Unavailable` is terminal for the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Ready,
    Unavailable { reason: String },
}

impl Phase {
    pub fn is_initializing(&self) -> bool {
        matches!(self, Phase::Initializing)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Phase::Ready)
    }

    /// Banner text for a failed start-up.
    pub fn banner(&self) -> Option<&str> {
        match self {
            Phase::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }
}

pub fn greeting() -> ChatMessage {
    ChatMessage::greeting(GREETING.as_str())
}

/// Builds the conversation handle for the configured model.
///
/// `connect` turns the credential into a service; it is never called when the
/// credential is missing. Any failure other than a missing credential is
/// reported as [`ChatError::SetupFailed`].
pub fn open_conversation<F>(config: &Config, connect: F) -> ChatResult<Box<dyn Conversation>>
where
    F: FnOnce(&Config, &str) -> ChatResult<Arc<dyn ChatService>>,
{
    let Some(api_key) = config.api_key.as_deref() else {
        return Err(ChatError::CredentialMissing);
    };

    connect(config, api_key)
        .and_then(|service| service.create_conversation(&config.model, SYSTEM_PROMPT))
        .map_err(|err| {
            if err.is_permanent() {
                err
            } else {
                ChatError::SetupFailed(err.to_string())
            }
        })
}

/// Connector for the hosted Gemini API.
pub fn connect_gemini(config: &Config, api_key: &str) -> ChatResult<Arc<dyn ChatService>> {
    Ok(Arc::new(GeminiService::connect(api_key, &config.api_base)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ScriptedService;

    fn config_with_key(key: Option<&str>) -> Config {
        Config {
            api_key: key.map(str::to_string),
            ..Config::default()
        }
    }

    #[test]
    fn missing_credential_never_connects() {
        let mut connected = false;
        let result = open_conversation(&config_with_key(None), |_, _| {
            connected = true;
            Ok(Arc::new(ScriptedService::new()))
        });
        assert!(matches!(result, Err(ChatError::CredentialMissing)));
        assert!(!connected);
    }

    #[test]
    fn creates_one_conversation() {
        let service = ScriptedService::new();
        let handle = service.clone();
        let result = open_conversation(&config_with_key(Some("k")), move |_, key| {
            assert_eq!(key, "k");
            Ok(Arc::new(handle))
        });
        assert!(result.is_ok());
        assert_eq!(service.conversations_created(), 1);
    }

    #[test]
    fn other_failures_become_setup_failed() {
        let result = open_conversation(&config_with_key(Some("k")), |_, _| {
            Ok(Arc::new(ScriptedService::failing_setup(ChatError::transport(
                "quota project missing",
            ))))
        });
        assert_eq!(
            result.err(),
            Some(ChatError::SetupFailed("quota project missing".to_string()))
        );
    }

    #[test]
    fn gemini_connector_rejects_bad_base() {
        let config = Config {
            api_key: Some("k".to_string()),
            api_base: "::".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            open_conversation(&config, connect_gemini),
            Err(ChatError::SetupFailed(_))
        ));
    }

    #[test]
    fn greeting_names_the_assistant() {
        let msg = greeting();
        assert_eq!(msg.text, "Hello! I'm Yanto.Ai. How can I help you today?");
        assert_eq!(msg.id.as_str(), "initial-ai-greeting");
    }

    #[test]
    fn banner_only_for_unavailable() {
        assert_eq!(Phase::Ready.banner(), None);
        let phase = Phase::Unavailable {
            reason: ChatError::CredentialMissing.to_string(),
        };
        assert_eq!(
            phase.banner(),
            Some("API_KEY environment variable is not set. Please configure it to use the chat.")
        );
    }
}
