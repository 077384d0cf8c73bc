//! Single-slot streaming dispatcher.
//!
//! Owns the conversation handle and the transcript. One exchange runs at a
//! time: a submission arriving while another is in flight is rejected, not
//! queued. There is no cancellation; an opened stream runs until it ends or
//! fails.

use crate::ai::{ChatError, ChatResult, ChatService, Conversation};
use crate::config::Config;
use crate::session::{self, Phase};
use crate::transcript::{Transcript, TranscriptStore, append_fragment, finish_streaming};
use crate::types::{ChatMessage, MessageId};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Exchange lifecycle. Everything other than `Idle` counts as busy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
    Streaming,
    Settling,
    Failed,
}

/// Why a submission was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No conversation handle: still initializing or start-up failed.
    NotReady,
    /// Another exchange is in flight.
    Busy,
    /// Nothing but whitespace.
    Blank,
}

#[derive(Debug)]
pub enum Submission {
    /// The exchange runs on this task; awaiting it waits for `Idle`.
    Accepted(JoinHandle<()>),
    Rejected(Rejection),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Submission::Accepted(_) => None,
            Submission::Rejected(rejection) => Some(*rejection),
        }
    }

    /// Waits for an accepted exchange to finish; returns the rejection otherwise.
    pub async fn finished(self) -> Result<(), Rejection> {
        match self {
            Submission::Accepted(task) => {
                if let Err(err) = task.await {
                    tracing::error!(error = %err, "exchange task aborted");
                }
                Ok(())
            }
            Submission::Rejected(rejection) => Err(rejection),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    transcript: TranscriptStore,
    phase: watch::Sender<Phase>,
    state: watch::Sender<DispatchState>,
    notice: watch::Sender<Option<String>>,
    conversation: Mutex<Option<Box<dyn Conversation>>>,
    started: AtomicBool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                transcript: TranscriptStore::new(),
                phase: watch::channel(Phase::Initializing).0,
                state: watch::channel(DispatchState::Idle).0,
                notice: watch::channel(None).0,
                conversation: Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Opens the session's conversation. Only the first call has any effect.
    ///
    /// On success the greeting is appended and the phase becomes `Ready`; on
    /// failure the phase becomes `Unavailable` for the rest of the process.
    pub async fn initialize<F>(&self, config: &Config, connect: F)
    where
        F: FnOnce(&Config, &str) -> ChatResult<Arc<dyn ChatService>>,
    {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("session already initialized");
            return;
        }

        match session::open_conversation(config, connect) {
            Ok(conversation) => {
                *self.inner.conversation.lock().await = Some(conversation);
                self.inner.transcript.append(session::greeting());
                self.inner.phase.send_replace(Phase::Ready);
                tracing::info!(model = %config.model, "chat session ready");
            }
            Err(err) => {
                tracing::error!(error = %err, "chat session unavailable");
                self.inner.phase.send_replace(Phase::Unavailable {
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Starts an exchange for `text`.
    ///
    /// On acceptance the user message and an empty streaming AI placeholder
    /// are already in the transcript when this returns.
    pub fn submit(&self, text: &str) -> Submission {
        if !self.phase().is_ready() {
            tracing::debug!("submission rejected: session not ready");
            return Submission::Rejected(Rejection::NotReady);
        }
        if text.trim().is_empty() {
            return Submission::Rejected(Rejection::Blank);
        }

        let claimed = self.inner.state.send_if_modified(|state| {
            if *state != DispatchState::Idle {
                return false;
            }
            *state = DispatchState::Sending;
            true
        });
        if !claimed {
            tracing::debug!("submission rejected: exchange in flight");
            return Submission::Rejected(Rejection::Busy);
        }

        self.inner.notice.send_replace(None);
        self.inner.transcript.append(ChatMessage::user(text));
        let placeholder = ChatMessage::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.inner.transcript.append(placeholder);
        tracing::info!(placeholder = %placeholder_id, chars = text.len(), "submission accepted");

        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        Submission::Accepted(tokio::spawn(async move {
            inner.run_exchange(placeholder_id, text).await;
        }))
    }

    pub fn transcript(&self) -> Transcript {
        self.inner.transcript.snapshot()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.inner.transcript.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.borrow().clone()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.inner.phase.subscribe()
    }

    pub fn state(&self) -> DispatchState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DispatchState> {
        self.inner.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state() != DispatchState::Idle
    }

    /// Description of the last failed exchange, cleared by the next accepted
    /// submission.
    pub fn notice(&self) -> Option<String> {
        self.inner.notice.borrow().clone()
    }

    pub fn subscribe_notice(&self) -> watch::Receiver<Option<String>> {
        self.inner.notice.subscribe()
    }
}

impl Inner {
    async fn run_exchange(&self, placeholder_id: MessageId, text: String) {
        let started = Instant::now();
        let outcome = {
            let mut conversation = self.conversation.lock().await;
            match conversation.as_mut() {
                Some(conversation) => {
                    self.stream_reply(conversation.as_mut(), &placeholder_id, &text)
                        .await
                }
                None => Err(ChatError::transport("Chat session not initialized.")),
            }
        };

        match outcome {
            Ok(fragments) => {
                self.set_state(DispatchState::Settling);
                self.transcript.patch(&placeholder_id, finish_streaming);
                tracing::info!(
                    fragments,
                    duration_ms = %started.elapsed().as_millis(),
                    "reply streamed"
                );
            }
            Err(err) => {
                self.set_state(DispatchState::Failed);
                tracing::warn!(
                    error = %err,
                    duration_ms = %started.elapsed().as_millis(),
                    "exchange failed"
                );
                self.transcript
                    .discard_and_append(&placeholder_id, ChatMessage::ai_error(&err.to_string()));
                self.notice.send_replace(Some(format!("AI Error: {err}")));
            }
        }
        self.set_state(DispatchState::Idle);
    }

    /// Applies every fragment to the placeholder in delivery order.
    async fn stream_reply(
        &self,
        conversation: &mut dyn Conversation,
        placeholder_id: &MessageId,
        text: &str,
    ) -> ChatResult<usize> {
        let mut chunks = conversation.send_streaming(text).await?;
        self.set_state(DispatchState::Streaming);

        let mut fragments = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            self.transcript
                .patch(placeholder_id, append_fragment(&chunk.text));
            fragments += 1;
        }
        Ok(fragments)
    }

    fn set_state(&self, next: DispatchState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(?previous, ?next, "dispatch state");
    }
}
