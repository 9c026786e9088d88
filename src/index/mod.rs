
pub mod store;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::corpus::SectionDocument;
use crate::openai::ApiError;
use crate::openai::embeddings::EmbeddingClient;
use crate::{AssistError, Result};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Exact nearest-neighbor index over a flat slab of `f32` vectors,
/// compared by squared L2 distance.
///
/// Vector `i` always describes record `i` of the metadata that was built
/// with it. Nothing here is approximate: every search scans every vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

/// One search result: a vector position and its squared L2 distance from
/// the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub distance: f32,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AssistError::Index(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            vectors: Vec::new(),
        })
    }

    /// Rebuilds an index from a stored slab. The slab length must be an
    /// exact multiple of the dimension.
    #[inline]
    pub fn from_parts(dimension: usize, vectors: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(AssistError::Index(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }
        if vectors.len() % dimension != 0 {
            return Err(AssistError::Index(format!(
                "Vector slab of {} floats is not a multiple of dimension {}",
                vectors.len(),
                dimension
            )));
        }
        Ok(Self { dimension, vectors })
    }

    #[inline]
    pub fn push(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AssistError::Index(format!(
                "Vector has dimension {} but the index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    #[inline]
    pub fn as_slab(&self) -> &[f32] {
        &self.vectors
    }

    /// The `k` nearest vectors to `query`, closest first. Distance ties
    /// resolve to the lower position, so results are fully deterministic.
    /// Asking for more results than the index holds returns them all.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(AssistError::Index(format!(
                "Query has dimension {} but the index expects {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        // Bounded max-heap: the root is the worst of the current best k,
        // so most vectors are rejected with one comparison.
        let mut heap: BinaryHeap<ScoredHit> = BinaryHeap::with_capacity(k + 1);
        for (position, vector) in self.vectors.chunks_exact(self.dimension).enumerate() {
            let hit = ScoredHit {
                distance: squared_l2(query, vector),
                position,
            };
            if heap.len() < k {
                heap.push(hit);
            } else if let Some(worst) = heap.peek() {
                if hit < *worst {
                    heap.pop();
                    heap.push(hit);
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|hit| SearchHit {
                position: hit.position,
                distance: hit.distance,
            })
            .collect())
    }
}

/// Embeds every document and builds the index plus its positionally
/// aligned metadata records. A document whose embedding ultimately fails
/// is skipped, keeping vector `i` and record `i` in lockstep; an index
/// with nothing in it is an error, and so is an embedding whose
/// dimension disagrees with the first one.
///
/// Transient failures (rate limits, server errors, transport errors) are
/// retried here with exponential backoff. This is the only retrying caller
/// in the pipeline.
#[inline]
pub fn build_index(
    client: &EmbeddingClient,
    documents: &[SectionDocument],
    retry_attempts: u32,
) -> Result<(FlatIndex, Vec<SectionDocument>)> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut embedded: Vec<(Vec<f32>, SectionDocument)> = Vec::with_capacity(documents.len());

    for document in documents {
        bar.set_message(document.filename.clone());

        match embed_with_retry(client, &document.full_text, retry_attempts) {
            Ok(embedding) => embedded.push((embedding, document.clone())),
            Err(e) => {
                warn!("Skipping {} due to embedding error: {e}", document.filename);
            }
        }

        bar.inc(1);
    }

    bar.finish_and_clear();

    let dimension = embedded
        .first()
        .map(|(embedding, _)| embedding.len())
        .ok_or(AssistError::EmptyIndex)?;

    let mut index = FlatIndex::new(dimension)?;
    let mut records = Vec::with_capacity(embedded.len());
    for (embedding, document) in embedded {
        index.push(&embedding)?;
        records.push(document);
    }

    debug!(
        "Built index with dimension {} and {} vectors",
        index.dimension(),
        index.len()
    );
    Ok((index, records))
}

fn embed_with_retry(
    client: &EmbeddingClient,
    text: &str,
    retry_attempts: u32,
) -> std::result::Result<Vec<f32>, ApiError> {
    let attempts = retry_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match client.embed(text) {
            Ok(embedding) => return Ok(embedding),
            Err(error) => {
                if !error.is_transient() {
                    return Err(error);
                }
                warn!("Transient embedding error: {error}, attempt {attempt}/{attempts}");
                last_error = Some(error);

                if attempt < attempts {
                    let delay =
                        Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ApiError::Network("request failed".to_string())))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredHit {
    distance: f32,
    position: usize,
}

impl Eq for ScoredHit {}

impl Ord for ScoredHit {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for ScoredHit {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
