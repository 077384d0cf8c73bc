//! Ordered message log with snapshot semantics.
//!
//! A [`Transcript`] is an immutable value: every mutation returns a new
//! snapshot. [`TranscriptStore`] holds the current snapshot and publishes each
//! committed one to subscribers.

use crate::types::{ChatMessage, MessageId};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transcript {
    messages: Arc<Vec<ChatMessage>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|msg| &msg.id == id)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// The message currently receiving chunks, if any.
    pub fn streaming(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|msg| msg.is_streaming)
    }

    pub fn appended(&self, message: ChatMessage) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        Self {
            messages: Arc::new(messages),
        }
    }

    /// Replaces the message with `id` by `patch(old)`. Unknown ids leave the
    /// snapshot unchanged.
    pub fn patched(&self, id: &MessageId, patch: impl FnOnce(&ChatMessage) -> ChatMessage) -> Self {
        let Some(index) = self.position(id) else {
            return self.clone();
        };
        let mut messages = self.messages.as_ref().clone();
        messages[index] = patch(&self.messages[index]);
        Self {
            messages: Arc::new(messages),
        }
    }

    pub fn removed(&self, id: &MessageId) -> Self {
        if self.position(id).is_none() {
            return self.clone();
        }
        let messages = self
            .messages
            .iter()
            .filter(|msg| &msg.id != id)
            .cloned()
            .collect();
        Self {
            messages: Arc::new(messages),
        }
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|msg| &msg.id == id)
    }
}

/// Appends `fragment` to the message text and keeps every other field.
pub fn append_fragment(fragment: &str) -> impl FnOnce(&ChatMessage) -> ChatMessage + '_ {
    move |msg: &ChatMessage| {
        let mut text = String::with_capacity(msg.text.len() + fragment.len());
        text.push_str(&msg.text);
        text.push_str(fragment);
        ChatMessage {
            text,
            ..msg.clone()
        }
    }
}

pub fn finish_streaming(msg: &ChatMessage) -> ChatMessage {
    ChatMessage {
        is_streaming: false,
        ..msg.clone()
    }
}

/// Observable holder of the current transcript snapshot.
#[derive(Clone, Debug)]
pub struct TranscriptStore {
    tx: Arc<watch::Sender<Transcript>>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Transcript::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every committed snapshot from now on.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.tx.subscribe()
    }

    pub fn append(&self, message: ChatMessage) {
        self.commit(|current| current.appended(message));
    }

    pub fn patch(&self, id: &MessageId, patch: impl FnOnce(&ChatMessage) -> ChatMessage) {
        self.commit(|current| current.patched(id, patch));
    }

    pub fn remove(&self, id: &MessageId) {
        self.commit(|current| current.removed(id));
    }

    /// Removes `id` and appends `message` as a single commit, so no
    /// subscriber observes the transcript between the two.
    pub fn discard_and_append(&self, id: &MessageId, message: ChatMessage) {
        self.commit(|current| current.removed(id).appended(message));
    }

    fn commit(&self, mutate: impl FnOnce(&Transcript) -> Transcript) {
        self.tx.send_if_modified(|current| {
            let next = mutate(current);
            if Arc::ptr_eq(&next.messages, &current.messages) {
                return false;
            }
            *current = next;
            true
        });
    }
}
