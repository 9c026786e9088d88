#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end build pipeline against a mock embedding service:
// corpus -> embed -> index -> artifact pair -> reload -> search.
// Run with: cargo test --test integration_build

use std::path::Path;

use mgl_assist::AssistError;
use mgl_assist::config::{ApiConfig, CitationConfig, RetrievalConfig};
use mgl_assist::corpus::load_sections;
use mgl_assist::index::build_index;
use mgl_assist::index::store::{Manifest, load_pair, save_pair};
use mgl_assist::openai::embeddings::EmbeddingClient;
use mgl_assist::retrieval::Retriever;
use serde_json::json;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Returns a distinct axis-aligned vector per marker keyword, so every
/// document is its own nearest neighbor and positional alignment is
/// observable through search results.
fn embedding_for(input: &str) -> Vec<f32> {
    ["deed", "lease", "mortgage"]
        .iter()
        .map(|marker| if input.contains(marker) { 1.0 } else { 0.0 })
        .collect()
}

struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body should be JSON");
        let input = body["input"].as_str().unwrap_or_default();

        // Texts marked as poison simulate a document the service rejects.
        if input.contains("poison") {
            return ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "invalid input", "type": "invalid_request_error"}
            }));
        }

        // Texts marked as narrow get a vector of the wrong width.
        if input.contains("narrow") {
            return ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [{"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}]
            }));
        }

        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": [{"object": "embedding", "index": 0, "embedding": embedding_for(input)}]
        }))
    }
}

fn start_mock_embeddings() -> (Runtime, MockServer) {
    let rt = Runtime::new().expect("should create tokio runtime");
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(EmbeddingResponder)
            .mount(&server)
            .await;
        server
    });
    (rt, server)
}

fn embedding_client(server: &MockServer) -> EmbeddingClient {
    let api = ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    };
    EmbeddingClient::new(&api, "test-key".to_string(), 8150)
}

fn write_corpus(dir: &Path, files: &[(&str, &str)]) {
    for (name, text) in files {
        std::fs::write(dir.join(name), text).expect("should write corpus file");
    }
}

#[test]
fn build_save_load_search_round_trip() {
    let (_rt, server) = start_mock_embeddings();

    let corpus_dir = TempDir::new().expect("should create TempDir successfully");
    write_corpus(
        corpus_dir.path(),
        &[
            ("Chapter183_Section1.txt", "A deed must be recorded.\n"),
            ("Chapter184_Section2.txt", "A lease binds both parties.\n"),
            ("Chapter185_Section3A.txt", "A mortgage secures a loan.\n"),
        ],
    );

    let sections = load_sections(corpus_dir.path(), &CitationConfig::default())
        .expect("should load sections");
    assert_eq!(sections.len(), 3);

    let client = embedding_client(&server);
    let (flat_index, records) = build_index(&client, &sections, 1).expect("should build index");
    assert_eq!(flat_index.len(), 3);
    assert_eq!(flat_index.dimension(), 3);
    assert_eq!(records.len(), 3);

    // Persist and reload the pair.
    let artifact_dir = TempDir::new().expect("should create TempDir successfully");
    let index_path = artifact_dir.path().join("statute_index.bin");
    let metadata_path = artifact_dir.path().join("statute_metadata.json");
    let manifest = Manifest::new("text-embedding-3-small".to_string(), 3, records.clone());
    save_pair(&flat_index, &manifest, &index_path, &metadata_path).expect("should save pair");

    let (loaded_index, loaded_manifest) =
        load_pair(&index_path, &metadata_path).expect("should load pair");
    assert_eq!(loaded_index, flat_index);
    assert_eq!(loaded_manifest.sections, records);

    // The nearest section to a query about leases is the lease document,
    // cited through its filename-derived labels.
    let retriever = Retriever::new(
        embedding_client(&server),
        loaded_index,
        loaded_manifest.sections,
        RetrievalConfig::default(),
    );
    let result = retriever.retrieve("What does a lease require?");
    assert_eq!(result.passages.len(), 3);
    assert!(
        result.passages[0]
            .citation
            .starts_with("(Chapter 184 Section 2,")
    );
    assert!(result.passages[0].snippet.contains("lease"));
}

#[test]
fn failing_document_is_skipped_and_alignment_holds() {
    let (_rt, server) = start_mock_embeddings();

    let corpus_dir = TempDir::new().expect("should create TempDir successfully");
    write_corpus(
        corpus_dir.path(),
        &[
            ("Chapter183_Section1.txt", "A deed must be recorded.\n"),
            ("Chapter183_Section2.txt", "poison\n"),
            ("Chapter184_Section2.txt", "A lease binds both parties.\n"),
            ("Chapter185_Section3A.txt", "A mortgage secures a loan.\n"),
        ],
    );

    let sections = load_sections(corpus_dir.path(), &CitationConfig::default())
        .expect("should load sections");
    assert_eq!(sections.len(), 4);

    let client = embedding_client(&server);
    let (flat_index, records) = build_index(&client, &sections, 1).expect("should build index");

    // One fewer entry on both sides, still aligned.
    assert_eq!(flat_index.len(), 3);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| !r.full_text.contains("poison")));

    let retriever = Retriever::new(
        embedding_client(&server),
        flat_index,
        records,
        RetrievalConfig::default(),
    );
    let result = retriever.retrieve("Who holds the mortgage?");
    assert!(
        result.passages[0]
            .citation
            .starts_with("(Chapter 185 Section 3A,")
    );
}

#[test]
fn ragged_embedding_dimensions_are_fatal() {
    let (_rt, server) = start_mock_embeddings();

    let corpus_dir = TempDir::new().expect("should create TempDir successfully");
    write_corpus(
        corpus_dir.path(),
        &[
            ("Chapter183_Section1.txt", "A deed must be recorded.\n"),
            ("Chapter183_Section2.txt", "narrow\n"),
        ],
    );

    let sections = load_sections(corpus_dir.path(), &CitationConfig::default())
        .expect("should load sections");
    let client = embedding_client(&server);

    // The second document embeds to two floats while the first set the
    // index width to three. That is corruption, not a skippable document.
    let result = build_index(&client, &sections, 1);
    match result {
        Err(AssistError::Index(message)) => {
            assert!(message.contains("dimension 2"));
            assert!(message.contains("expects 3"));
        }
        other => panic!("expected a dimension error, got {other:?}"),
    }
}

#[test]
fn all_documents_failing_is_fatal() {
    let (_rt, server) = start_mock_embeddings();

    let corpus_dir = TempDir::new().expect("should create TempDir successfully");
    write_corpus(
        corpus_dir.path(),
        &[
            ("Chapter183_Section1.txt", "poison one\n"),
            ("Chapter183_Section2.txt", "poison two\n"),
        ],
    );

    let sections = load_sections(corpus_dir.path(), &CitationConfig::default())
        .expect("should load sections");
    let client = embedding_client(&server);

    let result = build_index(&client, &sections, 1);
    match result {
        Err(AssistError::EmptyIndex) => {
            assert_eq!(
                AssistError::EmptyIndex.to_string(),
                "No embeddings were obtained from documents"
            );
        }
        other => panic!("expected EmptyIndex error, got {other:?}"),
    }
}
