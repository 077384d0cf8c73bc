//! Startup configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file, with the bundled `assets/config.env` as the last fallback.

use std::env;

pub const APP_TITLE: &str = "Yanto.Ai";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const SYSTEM_PROMPT: &str = "You are Yanto.Ai, a helpful and friendly AI assistant. Engage in clear and concise conversation, providing informative and insightful responses. Be creative when appropriate and keep your responses relatively brief unless asked for detail.";

pub const API_KEY_VAR: &str = "API_KEY";
pub const MODEL_VAR: &str = "YANTO_MODEL";
pub const API_BASE_VAR: &str = "YANTO_API_BASE";

/// Bundled defaults for builds that ship without a `.env` file.
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// `None` when the credential is unset or blank.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and reads the configuration from the environment.
    pub fn from_env() -> Self {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok().or_else(|| bundled_value(key)))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            api_key: non_blank(API_KEY_VAR),
            model: non_blank(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: non_blank(API_BASE_VAR).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "failed to read .env"),
    }
}

#[cfg(target_arch = "wasm32")]
fn load_dotenv() {}

fn bundled_value(key: &str) -> Option<String> {
    parse_env_lines(BUNDLED_CONFIG)
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.to_string())
}

fn parse_env_lines(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}
