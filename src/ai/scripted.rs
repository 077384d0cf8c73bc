//! Deterministic in-process [`ChatService`] that replays queued replies.
//!
//! Contains no transport logic. Tests queue one [`Reply`] per expected
//! exchange and inspect what was sent afterwards.

use super::{ChatError, ChatResult, ChatService, Chunk, ChunkStream, Conversation};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Canned outcome for one `send_streaming` call.
#[derive(Debug)]
pub enum Reply {
    /// Fragments delivered in order; an `Err` item ends the stream.
    Chunks(Vec<ChatResult<String>>),
    /// The call itself fails before any chunk arrives.
    OpenError(ChatError),
    /// Fragments pushed by the test through the paired sender; dropping the
    /// sender ends the stream.
    Live(mpsc::UnboundedReceiver<ChatResult<String>>),
}

impl Reply {
    pub fn text(fragments: &[&str]) -> Self {
        Self::Chunks(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn failing_after(fragments: &[&str], error: &str) -> Self {
        let mut items: Vec<ChatResult<String>> =
            fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(ChatError::transport(error)));
        Self::Chunks(items)
    }

    pub fn live() -> (mpsc::UnboundedSender<ChatResult<String>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::Live(rx))
    }
}

#[derive(Default)]
struct Shared {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<String>>,
    conversations: AtomicUsize,
    setup_error: Mutex<Option<ChatError>>,
}

#[derive(Clone, Default)]
pub struct ScriptedService {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_conversation` fail with `error`.
    pub fn failing_setup(error: ChatError) -> Self {
        let service = Self::default();
        *lock(&service.shared.setup_error) = Some(error);
        service
    }

    pub fn push_reply(&self, reply: Reply) {
        lock(&self.shared.replies).push_back(reply);
    }

    /// Texts passed to `send_streaming`, in call order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.shared.sent).clone()
    }

    pub fn conversations_created(&self) -> usize {
        self.shared.conversations.load(Ordering::SeqCst)
    }
}

impl ChatService for ScriptedService {
    fn create_conversation(
        &self,
        _model: &str,
        _system_instruction: &str,
    ) -> ChatResult<Box<dyn Conversation>> {
        if let Some(error) = lock(&self.shared.setup_error).clone() {
            return Err(error);
        }
        self.shared.conversations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConversation {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ScriptedConversation {
    shared: Arc<Shared>,
}

#[async_trait]
impl Conversation for ScriptedConversation {
    async fn send_streaming(&mut self, text: &str) -> ChatResult<ChunkStream> {
        lock(&self.shared.sent).push(text.to_string());
        let reply = lock(&self.shared.replies)
            .pop_front()
            .ok_or_else(|| ChatError::transport("no scripted reply queued"))?;

        match reply {
            Reply::Chunks(items) => {
                let chunks: Vec<ChatResult<Chunk>> = items
                    .into_iter()
                    .map(|item| item.map(|text| Chunk { text }))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
            Reply::OpenError(error) => Err(error),
            Reply::Live(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                let item = rx.recv().await?;
                Some((item.map(|text| Chunk { text }), rx))
            })
            .boxed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queued_replies_in_order() {
        let service = ScriptedService::new();
        service.push_reply(Reply::text(&["a", "b"]));
        service.push_reply(Reply::OpenError(ChatError::transport("down")));

        let mut conversation = service.create_conversation("m", "s").unwrap();
        let chunks: Vec<_> = conversation
            .send_streaming("one")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks, vec![Ok(Chunk::new("a")), Ok(Chunk::new("b"))]);

        assert_eq!(
            conversation.send_streaming("two").await.err(),
            Some(ChatError::transport("down"))
        );
        assert_eq!(service.sent(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(service.conversations_created(), 1);
    }

    #[tokio::test]
    async fn live_reply_ends_when_sender_drops() {
        let service = ScriptedService::new();
        let (tx, reply) = Reply::live();
        service.push_reply(reply);

        let mut conversation = service.create_conversation("m", "s").unwrap();
        let mut stream = conversation.send_streaming("hi").await.unwrap();
        tx.send(Ok("x".to_string())).unwrap();
        assert_eq!(stream.next().await, Some(Ok(Chunk::new("x"))));
        drop(tx);
        assert_eq!(stream.next().await, None);
    }
}
