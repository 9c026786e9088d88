//! Conversation state for the chat loop: windowed history, retrieval-keyed
//! system prompts, and turn submission.

pub mod stream;


use std::io::Write;

use tracing::debug;

use crate::Result;
use crate::config::SessionConfig;
use crate::openai::chat::{ChatClient, ChatMessage};
use crate::retrieval::Retriever;

/// One user's conversation with the assistant.
///
/// History grows without bound; only the trailing window configured by
/// `history_window` is read when composing a request. Context is retrieved
/// fresh for each turn from the raw user text, never accumulated across
/// turns. A session serves one turn at a time and is not shared.
#[derive(Debug)]
pub struct ChatSession {
    history: Vec<ChatMessage>,
    retriever: Retriever,
    chat: ChatClient,
    config: SessionConfig,
}

impl ChatSession {
    #[inline]
    pub fn new(retriever: Retriever, chat: ChatClient, config: SessionConfig) -> Self {
        Self {
            history: Vec::new(),
            retriever,
            chat,
            config,
        }
    }

    /// Full transcript so far, oldest first.
    #[inline]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Runs one conversation turn and returns the assistant's answer.
    ///
    /// The answer (streamed or single-shot per configuration) is written to
    /// `out` as it arrives. Transport and service failures are reported to
    /// `out` as a one-line diagnostic and yield an empty answer; the session
    /// stays usable for the next turn. Only a non-empty answer is recorded
    /// in history, so a failed turn leaves no assistant placeholder behind.
    #[inline]
    pub fn submit(&mut self, user_text: &str, out: &mut impl Write) -> Result<String> {
        let context = self.retriever.retrieve(user_text).context_block();
        let system_prompt = format!("{}\n{}", self.config.base_prompt, context);

        self.history.push(ChatMessage::user(user_text.to_string()));
        let messages = compose_messages(
            &system_prompt,
            &self.history,
            self.config.history_window,
            user_text,
        );
        debug!("Submitting turn ({} messages)", messages.len());

        let answer = if self.config.stream {
            match self.chat.stream(&messages) {
                Ok(fragments) => {
                    write!(out, "\nOpenAI API: ")?;
                    out.flush()?;
                    stream::drain_stream(fragments, out)?
                }
                Err(e) => {
                    writeln!(out, "{}", e.user_message())?;
                    String::new()
                }
            }
        } else {
            match self.chat.complete(&messages) {
                Ok(answer) => {
                    writeln!(out, "\nOpenAI API: {answer}")?;
                    answer
                }
                Err(e) => {
                    writeln!(out, "{}", e.user_message())?;
                    String::new()
                }
            }
        };

        if !answer.is_empty() {
            self.history.push(ChatMessage::assistant(answer.clone()));
        }
        Ok(answer)
    }
}

/// Composes the outgoing message sequence for one turn: the system prompt,
/// the trailing `window` entries of history, then the current user turn
/// unless it is already the last windowed entry. The guard keeps the turn
/// from being submitted twice, since `submit` records it in history before
/// composing.
fn compose_messages(
    system_prompt: &str,
    history: &[ChatMessage],
    window: usize,
    user_text: &str,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(window);
    let windowed = &history[start..];

    let mut messages = Vec::with_capacity(windowed.len() + 2);
    messages.push(ChatMessage::system(system_prompt.to_string()));
    messages.extend_from_slice(windowed);

    let already_submitted = windowed
        .last()
        .is_some_and(|last| last.is_user() && last.content == user_text);
    if !already_submitted {
        messages.push(ChatMessage::user(user_text.to_string()));
    }
    messages
}
