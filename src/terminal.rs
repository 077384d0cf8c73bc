//! Line-oriented front end used when no UI feature is compiled in.
//!
//! Reads one utterance per stdin line and prints AI replies to stdout as
//! their chunks arrive.

use crate::config::{APP_TITLE, Config};
use crate::dispatcher::{Dispatcher, Rejection, Submission};
use crate::session::connect_gemini;
use crate::transcript::Transcript;
use crate::types::{MessageId, Sender};
use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

const PROMPT: &str = "> ";

pub async fn run(config: &Config) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    write_out(&mut stdout, &format!("Initializing {APP_TITLE}...\n")).await?;

    let dispatcher = Dispatcher::new();
    dispatcher.initialize(config, connect_gemini).await;
    if let Some(reason) = dispatcher.phase().banner() {
        write_out(&mut stdout, &format!("Configuration Error: {reason}\n")).await?;
        return Ok(());
    }

    let mut printer = TranscriptPrinter::default();
    let mut updates = dispatcher.subscribe_transcript();
    let greeting = printer.render(&updates.borrow_and_update());
    write_out(&mut stdout, &greeting).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write_out(&mut stdout, PROMPT).await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let mut task = match dispatcher.submit(line.trim()) {
            Submission::Accepted(task) => task,
            Submission::Rejected(Rejection::Blank) => continue,
            Submission::Rejected(rejection) => {
                tracing::warn!(?rejection, "input ignored");
                continue;
            }
        };

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let out = printer.render(&updates.borrow_and_update());
                    write_out(&mut stdout, &out).await?;
                }
                joined = &mut task => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "exchange task aborted");
                    }
                    let out = printer.render(&updates.borrow_and_update());
                    write_out(&mut stdout, &out).await?;
                    break;
                }
            }
        }
    }

    write_out(&mut stdout, "\n").await
}

async fn write_out(stdout: &mut Stdout, text: &str) -> io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

/// Turns successive transcript snapshots into the text not yet printed.
///
/// User messages are skipped since the terminal already echoed them.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: HashMap<MessageId, usize>,
    open: Option<MessageId>,
}

impl TranscriptPrinter {
    pub fn render(&mut self, transcript: &Transcript) -> String {
        let mut out = String::new();

        // The open reply was discarded (failed exchange); end its line.
        if let Some(open) = &self.open
            && transcript.get(open).is_none()
        {
            out.push('\n');
            self.open = None;
        }

        for msg in transcript.messages() {
            if msg.sender == Sender::User {
                self.printed.insert(msg.id.clone(), msg.text.len());
                continue;
            }

            let seen = self.printed.get(&msg.id).copied();
            let start = match seen {
                Some(start) => start,
                None => {
                    out.push_str(APP_TITLE);
                    out.push_str(": ");
                    0
                }
            };
            if let Some(fresh) = msg.text.get(start..) {
                out.push_str(fresh);
            }
            self.printed.insert(msg.id.clone(), msg.text.len());

            let was_open = self.open.as_ref() == Some(&msg.id);
            if msg.is_streaming {
                self.open = Some(msg.id.clone());
            } else if seen.is_none() || was_open {
                out.push('\n');
                if was_open {
                    self.open = None;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::greeting;
    use crate::transcript::{append_fragment, finish_streaming};
    use crate::types::ChatMessage;

    #[test]
    fn prints_only_new_fragments() {
        let mut printer = TranscriptPrinter::default();
        let placeholder = ChatMessage::placeholder();
        let id = placeholder.id.clone();

        let t0 = Transcript::new().appended(greeting());
        assert_eq!(
            printer.render(&t0),
            "Yanto.Ai: Hello! I'm Yanto.Ai. How can I help you today?\n"
        );

        let t1 = t0.appended(ChatMessage::user("Hi")).appended(placeholder);
        assert_eq!(printer.render(&t1), "Yanto.Ai: ");

        let t2 = t1.patched(&id, append_fragment("He"));
        assert_eq!(printer.render(&t2), "He");
        let t3 = t2.patched(&id, append_fragment("llo!"));
        assert_eq!(printer.render(&t3), "llo!");

        let t4 = t3.patched(&id, finish_streaming);
        assert_eq!(printer.render(&t4), "\n");
        assert_eq!(printer.render(&t4), "");
    }

    #[test]
    fn closes_line_when_placeholder_is_discarded() {
        let mut printer = TranscriptPrinter::default();
        let placeholder = ChatMessage::placeholder();
        let id = placeholder.id.clone();
        let t0 = Transcript::new()
            .appended(ChatMessage::user("Hi"))
            .appended(placeholder)
            .patched(&id, append_fragment("par"));
        assert_eq!(printer.render(&t0), "Yanto.Ai: par");

        let t1 = t0
            .removed(&id)
            .appended(ChatMessage::ai_error("reset"));
        assert_eq!(
            printer.render(&t1),
            "\nYanto.Ai: Sorry, I encountered an error: reset\n"
        );
    }
}
