//! Query-time retrieval: embed the question, search the flat index, and
//! format the nearest sections into a citation-grounded context block.

use itertools::Itertools;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::corpus::SectionDocument;
use crate::index::{FlatIndex, SearchHit};
use crate::openai::embeddings::EmbeddingClient;


/// One retrieved statute section, formatted for prompt assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedPassage {
    /// `(Chapter X Section Y, link)`, with fallback labels for missing parts.
    pub citation: String,
    /// Leading slice of the section text, newlines flattened to spaces.
    pub snippet: String,
}

/// Retrieval output for one query, ordered nearest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalResult {
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Renders the block that gets appended to the system prompt.
    ///
    /// An empty retrieval produces an empty string, leaving the prompt
    /// unchanged rather than advertising a context section with nothing
    /// in it.
    #[inline]
    pub fn context_block(&self) -> String {
        if self.passages.is_empty() {
            return String::new();
        }
        let lines = self
            .passages
            .iter()
            .map(|passage| format!("{}: {}", passage.citation, passage.snippet))
            .join("\n");
        format!("Retrieved context:\n{lines}\n")
    }
}

/// Looks up the statute sections most relevant to a query.
///
/// Holds the flat index together with its positionally aligned metadata
/// records; hit `i` of a search is described by `records[i]`.
#[derive(Debug, Clone)]
pub struct Retriever {
    embeddings: EmbeddingClient,
    index: FlatIndex,
    records: Vec<SectionDocument>,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(
        embeddings: EmbeddingClient,
        index: FlatIndex,
        records: Vec<SectionDocument>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            records,
            config,
        }
    }

    /// Embeds `query` and returns up to `top_k` nearest sections.
    ///
    /// Embedding and search failures are downgraded to an empty result so
    /// that a conversation turn can proceed ungrounded instead of aborting.
    #[inline]
    pub fn retrieve(&self, query: &str) -> RetrievalResult {
        let embedding = match self.embeddings.embed(query) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Error obtaining embedding for query: {e}");
                return RetrievalResult::default();
            }
        };

        let hits = match self.index.search(&embedding, self.config.top_k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Vector search failed: {e}");
                return RetrievalResult::default();
            }
        };

        let passages = self.passages_for(&hits);
        debug!(
            "Retrieved {} of {} requested passages",
            passages.len(),
            self.config.top_k
        );
        RetrievalResult { passages }
    }

    /// Maps search hits onto their metadata records, preserving order.
    ///
    /// A hit position without a metadata record is filtered out rather
    /// than dereferenced.
    fn passages_for(&self, hits: &[SearchHit]) -> Vec<RetrievedPassage> {
        hits.iter()
            .filter_map(|hit| self.records.get(hit.position))
            .map(|record| RetrievedPassage {
                citation: self.citation(record),
                snippet: self.snippet(&record.full_text),
            })
            .collect()
    }

    fn citation(&self, record: &SectionDocument) -> String {
        format!(
            "({} {}, {})",
            record
                .chapter
                .as_deref()
                .unwrap_or(&self.config.missing_chapter_label),
            record
                .section
                .as_deref()
                .unwrap_or(&self.config.missing_section_label),
            record
                .link
                .as_deref()
                .unwrap_or(&self.config.missing_link_label),
        )
    }

    fn snippet(&self, text: &str) -> String {
        text.chars()
            .map(|c| if c == '\n' { ' ' } else { c })
            .take(self.config.snippet_chars)
            .collect()
    }
}
