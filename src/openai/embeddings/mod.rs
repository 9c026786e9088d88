
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;
use crate::config::ApiConfig;

/// Blocking client for the `/embeddings` endpoint.
///
/// The client makes exactly one attempt per call. Retry policy for bulk
/// builds belongs to the index builder; query-time callers treat a failure
/// as a degraded (empty) retrieval instead.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    endpoint: String,
    model: String,
    api_key: String,
    max_input_chars: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(api: &ApiConfig, api_key: String, max_input_chars: usize) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(api.timeout_secs)))
            .build()
            .into();

        Self {
            endpoint: api.endpoint("embeddings"),
            model: api.embedding_model.clone(),
            api_key,
            max_input_chars,
            agent,
        }
    }

    /// Embed one text, truncated to the configured character cap before it
    /// leaves the process. Over-long input is never an error.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let input = truncate_chars(text, self.max_input_chars);

        debug!("Requesting embedding (length: {})", input.len());

        let request = EmbedRequest {
            model: &self.model,
            input,
        };
        let request_json =
            serde_json::to_string(&request).map_err(|e| ApiError::Decode(e.to_string()))?;

        let response_text = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())?;

        let response: EmbedResponse =
            serde_json::from_str(&response_text).map_err(|e| ApiError::Decode(e.to_string()))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ApiError::Decode("embedding response contained no data".to_string()))?;

        if embedding.is_empty() {
            return Err(ApiError::Decode(
                "embedding response contained an empty vector".to_string(),
            ));
        }

        debug!("Received embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }
}

/// Truncates to at most `max_chars` characters without splitting a
/// character.
#[expect(
    clippy::string_slice,
    reason = "the index comes from char_indices, which always yields a char boundary"
)]
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(byte_index, _)| &text[..byte_index])
}
