//! Google Gemini client over `streamGenerateContent` with SSE framing.

use super::sse::SseDecoder;
use super::{ChatError, ChatResult, ChatService, Chunk, ChunkStream, Conversation};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connected client; creates conversations that share one HTTP pool.
pub struct GeminiService {
    client: Client,
    api_key: String,
    api_base: Url,
}

impl GeminiService {
    pub fn connect(api_key: &str, api_base: &str) -> ChatResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ChatError::CredentialMissing);
        }
        let api_base = Url::parse(api_base)
            .map_err(|e| ChatError::SetupFailed(format!("invalid API base '{api_base}': {e}")))?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatError::SetupFailed(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            api_base,
        })
    }

    fn stream_url(&self, model: &str) -> ChatResult<Url> {
        let model = model.trim().trim_start_matches("models/");
        if model.is_empty() {
            return Err(ChatError::SetupFailed("model name is empty".to_string()));
        }
        let base = self.api_base.as_str().trim_end_matches('/');
        let raw = format!("{base}/v1beta/models/{model}:streamGenerateContent?alt=sse");
        Url::parse(&raw).map_err(|e| ChatError::SetupFailed(format!("invalid model '{model}': {e}")))
    }
}

impl ChatService for GeminiService {
    fn create_conversation(
        &self,
        model: &str,
        system_instruction: &str,
    ) -> ChatResult<Box<dyn Conversation>> {
        let url = self.stream_url(model)?;
        tracing::debug!(%url, "created Gemini conversation");
        Ok(Box::new(GeminiConversation {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            url,
            system_instruction: Content::system(system_instruction),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

pub struct GeminiConversation {
    client: Client,
    api_key: String,
    url: Url,
    system_instruction: Content,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiConversation {
    fn request_contents(&self, user_turn: &Content) -> Vec<Content> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.extend(history.iter().cloned());
        contents.push(user_turn.clone());
        contents
    }

    /// Commits the exchange to the history once its reply is complete.
    ///
    /// Gemini rejects turns with empty text, so a reply without text leaves
    /// neither turn behind.
    fn recorder(&self, user_turn: Content) -> impl FnOnce(String) + Send + use<> {
        let history = Arc::clone(&self.history);
        move |reply| {
            if reply.is_empty() {
                tracing::debug!("empty reply kept out of history");
                return;
            }
            let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(user_turn);
            history.push(Content::model(reply));
        }
    }
}

#[async_trait]
impl Conversation for GeminiConversation {
    async fn send_streaming(&mut self, text: &str) -> ChatResult<ChunkStream> {
        let user_turn = Content::user(text);
        let contents = self.request_contents(&user_turn);
        let response = self
            .client
            .post(self.url.clone())
            .header("x-goog-api-key", &self.api_key)
            .header("accept", "text/event-stream")
            .json(&GenerateContentRequest {
                contents: &contents,
                system_instruction: &self.system_instruction,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(describe_http_error(status.as_u16(), &body));
        }

        let body = response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed();
        Ok(sse_fragments(body, self.recorder(user_turn)))
    }
}

fn describe_http_error(status: u16, body: &str) -> ChatError {
    let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) else {
        return ChatError::transport(format!("HTTP {status}: {}", body.trim()));
    };
    let message = parsed.error.message;
    ChatError::transport(match status {
        400 => format!("Invalid request: {message}"),
        401 | 403 => format!("Authentication failed: {message}"),
        429 => format!("Rate limit exceeded: {message}"),
        500..=599 => format!("Server error: {message}"),
        _ => format!("HTTP {status}: {message}"),
    })
}

/// Turns a raw SSE body into text chunks. `on_complete` receives the full
/// reply only when the body ends without error.
pub(crate) fn sse_fragments(
    body: BoxStream<'static, ChatResult<Vec<u8>>>,
    on_complete: impl FnOnce(String) + Send + 'static,
) -> ChunkStream {
    let state = FragmentState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        reply: String::new(),
        on_complete: Some(Box::new(on_complete)),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            match state.ready.pop_front() {
                Some(Ok(text)) => {
                    state.reply.push_str(&text);
                    return Some((Ok(Chunk { text }), state));
                }
                Some(Err(err)) => {
                    state.ready.clear();
                    return Some((Err(err), state));
                }
                None => {}
            }

            if state.done {
                if let Some(on_complete) = state.on_complete.take() {
                    on_complete(std::mem::take(&mut state.reply));
                }
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let payloads = state.decoder.push(&bytes);
                    state.enqueue(payloads);
                }
                Some(Err(err)) => state.abort(err),
                None => {
                    state.done = true;
                    let tail = state.decoder.finish();
                    state.enqueue(tail);
                }
            }
        }
    })
    .boxed()
}

struct FragmentState {
    body: BoxStream<'static, ChatResult<Vec<u8>>>,
    decoder: SseDecoder,
    ready: VecDeque<ChatResult<String>>,
    reply: String,
    on_complete: Option<Box<dyn FnOnce(String) + Send>>,
    done: bool,
}

impl FragmentState {
    fn enqueue(&mut self, payloads: impl IntoIterator<Item = String>) {
        for data in payloads {
            match parse_gemini_sse_data(&data) {
                Ok(Some(text)) => self.ready.push_back(Ok(text)),
                Ok(None) => {}
                Err(err) => {
                    self.abort(err);
                    return;
                }
            }
        }
    }

    fn abort(&mut self, err: ChatError) {
        self.ready.push_back(Err(err));
        self.on_complete = None;
        self.done = true;
    }
}

/// Extracts the text fragment from one SSE `data` payload.
///
/// `Ok(None)` for payloads without text (usage-only or finish markers).
pub fn parse_gemini_sse_data(data: &str) -> ChatResult<Option<String>> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parsed: StreamResponse = serde_json::from_str(trimmed)?;
    if let Some(error) = parsed.error {
        return Err(ChatError::transport(error.describe()));
    }

    let text: String = parsed
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(Some(text));
    }

    if parsed.candidates.is_empty()
        && let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason)
    {
        return Err(ChatError::transport(format!("Response was blocked: {reason}")));
    }

    Ok(None)
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    system_instruction: &'a Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    fn model(text: String) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    status: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match &self.status {
            Some(status) => format!("{status}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: &[&str]) -> BoxStream<'static, ChatResult<Vec<u8>>> {
        let items: Vec<ChatResult<Vec<u8>>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(items).boxed()
    }

    fn text_event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({"candidates":[{"content":{"role":"model","parts":[{"text":text}]}}]})
        )
    }

    #[test]
    fn parses_text_payloads() {
        assert_eq!(parse_gemini_sse_data("  "), Ok(None));
        assert_eq!(
            parse_gemini_sse_data(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"}}]}"#
            ),
            Ok(Some("Hello".to_string()))
        );
        assert_eq!(
            parse_gemini_sse_data(
                r#"{"candidates":[{"content":{"parts":[{"text":"plan","thought":true},{"text":"answer"}]}}]}"#
            ),
            Ok(Some("answer".to_string()))
        );
    }

    #[test]
    fn skips_payloads_without_text() {
        assert_eq!(
            parse_gemini_sse_data(
                r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":9}}"#
            ),
            Ok(None)
        );
    }

    #[test]
    fn reports_errors_and_blocks() {
        assert_eq!(
            parse_gemini_sse_data(r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#),
            Err(ChatError::transport("UNAVAILABLE: overloaded"))
        );
        assert_eq!(
            parse_gemini_sse_data(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(ChatError::transport("Response was blocked: SAFETY"))
        );
        assert!(matches!(
            parse_gemini_sse_data("{not json"),
            Err(ChatError::Transport(_))
        ));
    }

    #[test]
    fn maps_http_error_bodies() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            describe_http_error(400, body),
            ChatError::transport("Invalid request: API key not valid.")
        );
        assert_eq!(
            describe_http_error(502, "bad gateway\n"),
            ChatError::transport("HTTP 502: bad gateway")
        );
    }

    #[test]
    fn request_serializes_history_and_system_instruction() {
        let contents = vec![
            Content::user("Hi"),
            Content::model("Hello!".to_string()),
            Content::user("How are you?"),
        ];
        let system = Content::system("Be brief.");
        let value = serde_json::to_value(GenerateContentRequest {
            contents: &contents,
            system_instruction: &system,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "How are you?"}]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}]}
            })
        );
    }

    #[test]
    fn stream_url_targets_sse_endpoint() {
        let service = GeminiService::connect("key", "http://127.0.0.1:9/").unwrap();
        assert_eq!(
            service.stream_url("models/gemini-test").unwrap().as_str(),
            "http://127.0.0.1:9/v1beta/models/gemini-test:streamGenerateContent?alt=sse"
        );
        assert!(matches!(
            service.stream_url(" "),
            Err(ChatError::SetupFailed(_))
        ));
    }

    #[test]
    fn connect_rejects_missing_key_and_bad_base() {
        assert!(matches!(
            GeminiService::connect("", "http://localhost"),
            Err(ChatError::CredentialMissing)
        ));
        assert!(matches!(
            GeminiService::connect("key", "not a url"),
            Err(ChatError::SetupFailed(_))
        ));
    }

    #[tokio::test]
    async fn fragments_follow_delivery_order_and_commit_reply() {
        let first = text_event("He");
        let second = text_event("llo!");
        let (head, tail) = second.split_at(7);
        let committed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&committed);

        let chunks: Vec<_> = sse_fragments(body(&[&first, head, tail]), move |reply| {
            *sink.lock().unwrap() = Some(reply);
        })
        .collect()
        .await;

        assert_eq!(chunks, vec![Ok(Chunk::new("He")), Ok(Chunk::new("llo!"))]);
        assert_eq!(committed.lock().unwrap().as_deref(), Some("Hello!"));
    }

    #[tokio::test]
    async fn error_payload_ends_stream_without_commit() {
        let first = text_event("partial");
        let failure = "data: {\"error\":{\"message\":\"boom\"}}\n\n";
        let later = text_event("never");
        let committed = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&committed);

        let chunks: Vec<_> = sse_fragments(body(&[&first, failure, &later]), move |_| {
            *sink.lock().unwrap() = true;
        })
        .collect()
        .await;

        assert_eq!(
            chunks,
            vec![Ok(Chunk::new("partial")), Err(ChatError::transport("boom"))]
        );
        assert!(!*committed.lock().unwrap());
    }

    #[tokio::test]
    async fn transport_failure_mid_body_is_reported() {
        let first = text_event("a");
        let items: Vec<ChatResult<Vec<u8>>> = vec![
            Ok(first.into_bytes()),
            Err(ChatError::transport("connection reset")),
        ];
        let chunks: Vec<_> = sse_fragments(stream::iter(items).boxed(), |_| {})
            .collect()
            .await;
        assert_eq!(
            chunks,
            vec![Ok(Chunk::new("a")), Err(ChatError::transport("connection reset"))]
        );
    }

    /// Answers one request per connection with the next canned SSE body and
    /// hands each request's JSON body to the test.
    async fn sse_server(
        replies: Vec<String>,
    ) -> (String, tokio::sync::mpsc::UnboundedReceiver<serde_json::Value>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                let header_end = loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "connection closed before headers");
                    request.extend_from_slice(&buf[..n]);
                    if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
                let length: usize = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|value| value.trim().parse().unwrap())
                    .unwrap_or(0);
                while request.len() < header_end + length {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "connection closed before body");
                    request.extend_from_slice(&buf[..n]);
                }
                let body: serde_json::Value =
                    serde_json::from_slice(&request[header_end..header_end + length]).unwrap();
                let _ = tx.send(body);

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
                    reply.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        (base, rx)
    }

    #[tokio::test]
    async fn reply_without_text_stays_out_of_history() {
        let blocked = "data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\n\n".to_string();
        let (base, mut requests) =
            sse_server(vec![blocked, text_event("Hi there"), text_event("ok")]).await;
        let service = GeminiService::connect("key", &base).unwrap();
        let mut conversation = service
            .create_conversation("gemini-test", "Be brief.")
            .unwrap();

        let first: Vec<_> = conversation
            .send_streaming("one")
            .await
            .unwrap()
            .collect()
            .await;
        assert!(first.is_empty());
        assert_eq!(
            requests.recv().await.unwrap()["contents"],
            serde_json::json!([{"role": "user", "parts": [{"text": "one"}]}])
        );

        let second: Vec<_> = conversation
            .send_streaming("two")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(second, vec![Ok(Chunk::new("Hi there"))]);
        assert_eq!(
            requests.recv().await.unwrap()["contents"],
            serde_json::json!([{"role": "user", "parts": [{"text": "two"}]}])
        );

        let _: Vec<_> = conversation
            .send_streaming("three")
            .await
            .unwrap()
            .collect()
            .await;
        let third = requests.recv().await.unwrap();
        assert_eq!(
            third["contents"],
            serde_json::json!([
                {"role": "user", "parts": [{"text": "two"}]},
                {"role": "model", "parts": [{"text": "Hi there"}]},
                {"role": "user", "parts": [{"text": "three"}]}
            ])
        );
        assert_eq!(
            third["systemInstruction"],
            serde_json::json!({"parts": [{"text": "Be brief."}]})
        );
    }
}
