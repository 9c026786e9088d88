
use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::BodyReader;

use super::ApiError;
use crate::config::ApiConfig;

/// One turn in a chat transcript, in the wire shape the API expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: String) -> Self {
        Self {
            role: "system".to_string(),
            content,
        }
    }

    #[inline]
    pub fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    #[inline]
    pub fn assistant(content: String) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
        }
    }

    #[inline]
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// Blocking client for the `/chat/completions` endpoint, in streamed and
/// single-shot form. Like the embedding client it makes one attempt per
/// call and leaves failure policy to the caller.
#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: String,
    model: String,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    /// The agent caps connecting and waiting for response headers, but not
    /// reading the body: a streamed answer may legitimately take longer
    /// than any fixed request timeout.
    #[inline]
    pub fn new(api: &ApiConfig, api_key: String) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(api.timeout_secs)))
            .timeout_recv_response(Some(Duration::from_secs(api.timeout_secs)))
            .build()
            .into();

        Self {
            endpoint: api.endpoint("chat/completions"),
            model: api.chat_model.clone(),
            api_key,
            agent,
        }
    }

    /// Request a completion and return the full answer text.
    #[inline]
    pub fn complete(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        debug!("Requesting completion ({} messages)", messages.len());

        let request_json = self.request_body(messages, false)?;
        let response_text = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    /// Request a streamed completion. Failures before the stream opens
    /// (bad request, rate limit, unreachable host) surface here; failures
    /// mid-stream surface as items of the returned iterator.
    #[inline]
    pub fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream, ApiError> {
        debug!("Requesting streamed completion ({} messages)", messages.len());

        let request_json = self.request_body(messages, true)?;
        let response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .send(&request_json)?;

        Ok(CompletionStream {
            reader: BufReader::new(response.into_body().into_reader()),
            done: false,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream,
        };
        serde_json::to_string(&request).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Iterator over the content fragments of one streamed completion, in
/// arrival order. Every `Ok` item is non-empty; role-only and empty deltas
/// are consumed internally. The iterator ends at the `[DONE]` sentinel or
/// after yielding one terminal `Err`.
pub struct CompletionStream {
    reader: BufReader<BodyReader<'static>>,
    done: bool,
}

impl Iterator for CompletionStream {
    type Item = Result<String, ApiError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(ApiError::Network(e.to_string())));
                }
            }

            match parse_sse_line(&line) {
                Ok(SseEvent::Fragment(content)) => return Some(Ok(content)),
                Ok(SseEvent::Skip) => {}
                Ok(SseEvent::Done) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::fmt::Debug for CompletionStream {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Fragment(String),
    Done,
    Skip,
}

/// One server-sent-events line to at most one content fragment. Blank
/// lines, comments, and deltas without content are all `Skip`.
fn parse_sse_line(line: &str) -> Result<SseEvent, ApiError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let Some(payload) = trimmed.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let payload = payload.trim_start();

    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: StreamChunk =
        serde_json::from_str(payload).map_err(|e| ApiError::Decode(e.to_string()))?;

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    if content.is_empty() {
        Ok(SseEvent::Skip)
    } else {
        Ok(SseEvent::Fragment(content))
    }
}
