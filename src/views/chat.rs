use crate::config::APP_TITLE;
use crate::transcript::Transcript;
use crate::types::{ChatMessage, Sender};
use crate::views::status::Spinner;
use dioxus::events::Key;
use dioxus::prelude::*;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

const MAX_INPUT_ROWS: usize = 3;
const CHAT_LIST_ID: &str = "chat-list";

fn format_message_timestamp(timestamp: OffsetDateTime) -> Option<String> {
    let mut datetime = timestamp;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

fn sender_class(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "user",
        Sender::Ai => "assistant",
    }
}

/// Textarea height follows the draft's line count, up to three rows.
fn input_rows(draft: &str) -> usize {
    draft.split('\n').count().clamp(1, MAX_INPUT_ROWS)
}

fn input_placeholder(disabled: bool) -> String {
    if disabled {
        "Chat unavailable".to_string()
    } else {
        format!("Type your message to {APP_TITLE}...")
    }
}

fn scroll_to_bottom_script(list_id: &str) -> String {
    format!(
        "const list = document.getElementById({list_id:?}); \
         if (list) {{ list.scrollTop = list.scrollHeight; }}"
    )
}

/// Keeps the newest message in view after every transcript change,
/// including each streamed fragment.
fn use_scroll_to_bottom(transcript: Signal<Transcript>) {
    use_effect(move || {
        let _ = transcript.read();
        let _ = document::eval(&scroll_to_bottom_script(CHAT_LIST_ID));
    });
}

#[component]
pub fn ChatView(
    transcript: Signal<Transcript>,
    busy: bool,
    disabled: bool,
    on_send: EventHandler<String>,
) -> Element {
    use_scroll_to_bottom(transcript);
    let snapshot = transcript();

    rsx! {
        div { id: CHAT_LIST_ID, class: "chat-list",
            for msg in snapshot.messages().iter().cloned() {
                ChatMessageItem { key: "{msg.id}", message: msg }
            }
        }
        ChatInput { busy, disabled, on_send }
    }
}

#[component]
fn ChatMessageItem(message: ChatMessage) -> Element {
    let class = sender_class(message.sender);
    let timestamp = format_message_timestamp(message.timestamp);

    rsx! {
        div { class: "message-row {class}",
            div { class: "bubble {class}",
                "{message.text}"
                if message.is_streaming {
                    div { class: "typing",
                        Spinner { large: false }
                        span { "Yanto is typing..." }
                    }
                }
                if let Some(ts) = timestamp {
                    span { class: "message-timestamp", "{ts}" }
                }
            }
        }
    }
}

#[component]
fn ChatInput(busy: bool, disabled: bool, on_send: EventHandler<String>) -> Element {
    let mut input = use_signal(String::new);

    let mut send = move || {
        let draft = input();
        let text = draft.trim();
        if text.is_empty() || busy || disabled {
            return;
        }
        on_send.call(text.to_string());
        input.set(String::new());
    };

    let draft = input();
    let rows = input_rows(&draft).to_string();
    let placeholder = input_placeholder(disabled);
    let blocked = busy || disabled;

    rsx! {
        form { class: "composer",
            onsubmit: move |ev| {
                ev.prevent_default();
                send();
            },
            textarea {
                rows: "{rows}",
                placeholder: "{placeholder}",
                value: "{draft}",
                disabled: blocked,
                autofocus: true,
                oninput: move |ev| input.set(ev.value()),
                onkeydown: move |ev| {
                    if ev.key() == Key::Enter && !ev.modifiers().shift() {
                        ev.prevent_default();
                        send();
                    }
                },
            }
            button {
                class: "btn-send",
                r#type: "submit",
                title: "Send message",
                disabled: blocked || draft.trim().is_empty(),
                if busy {
                    Spinner { large: false }
                } else {
                    "➤"
                }
            }
        }
    }
}
