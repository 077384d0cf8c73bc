//! AI module for Yanto
//!
//! This module holds the contract between the chat core and the hosted model.
//! A [`ChatService`] opens one [`Conversation`] bound to a model and a system
//! instruction; each call to [`Conversation::send_streaming`] yields the reply
//! as a finite, ordered stream of text [`Chunk`]s.
//!
//! # Architecture
//!
//! - `gemini` - Google Gemini client streaming over Server-Sent Events
//! - `scripted` - In-process service replaying canned replies, used by tests
//! - `sse` - Incremental SSE decoder shared by streaming clients
//!
//! # Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use yanto::ai::{ChatService, GeminiService};
//!
//! # async fn example() -> yanto::ai::ChatResult<()> {
//! let service = GeminiService::connect("key", "https://generativelanguage.googleapis.com")?;
//! let mut conversation = service.create_conversation("gemini-2.5-flash", "Be brief.")?;
//! let mut chunks = conversation.send_streaming("Hello!").await?;
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?.text);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod gemini;
pub mod scripted;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::{ChatError, ChatResult};
pub use gemini::{GeminiService, parse_gemini_sse_data};
pub use scripted::{Reply, ScriptedService};

/// One text fragment of a streamed reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Fragments in delivery order. Ends naturally or with one `Err` item.
pub type ChunkStream = BoxStream<'static, ChatResult<Chunk>>;

/// Factory for conversation handles.
pub trait ChatService: Send + Sync {
    fn create_conversation(
        &self,
        model: &str,
        system_instruction: &str,
    ) -> ChatResult<Box<dyn Conversation>>;
}

/// A long-lived conversation with the remote model.
#[async_trait]
pub trait Conversation: Send {
    /// Sends `text` as the next user turn and streams the reply.
    async fn send_streaming(&mut self, text: &str) -> ChatResult<ChunkStream>;
}
