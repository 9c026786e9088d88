use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "https://api.openai.com/v1");
    assert_eq!(config.api.embedding_model, "text-embedding-3-small");
    assert_eq!(config.api.chat_model, "gpt-4o");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.retrieval.max_input_chars, 8150);
    assert_eq!(config.retrieval.snippet_chars, 200);
    assert_eq!(config.retrieval.missing_chapter_label, "Unknown Chapter");
    assert_eq!(config.retrieval.missing_section_label, "Unknown Section");
    assert_eq!(config.retrieval.missing_link_label, "No link");
    assert_eq!(config.session.history_window, 10);
    assert!(config.session.stream);
    assert_eq!(config.citations.base_url, "https://malegislature.gov");
    assert_eq!(config.citations.start_path, "/Laws/GeneralLaws/PartII/TitleI/");
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.api.base_url = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.api.base_url = "not a url".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.api.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.api.chat_model = "   ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.api.timeout_secs = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.api.embed_retries = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.max_input_chars = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.snippet_chars = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.session.history_window = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.session.base_prompt = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.citations.base_url = "nope".to_string();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
[api]
chat_model = "gpt-4o-mini"

[retrieval]
top_k = 5
"#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.api.chat_model, "gpt-4o-mini");
    assert_eq!(parsed.api.embedding_model, "text-embedding-3-small");
    assert_eq!(parsed.retrieval.top_k, 5);
    assert_eq!(parsed.retrieval.max_input_chars, 8150);
    assert_eq!(parsed.session.history_window, 10);
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load_from(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.retrieval.top_k, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load_from(temp_dir.path()).expect("should load defaults");
    config.retrieval.top_k = 7;
    config.api.chat_model = "gpt-4.1".to_string();
    config.save().expect("should save config");

    let reloaded = Config::load_from(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded.retrieval.top_k, 7);
    assert_eq!(reloaded.api.chat_model, "gpt-4.1");
    assert_eq!(reloaded.base_dir, temp_dir.path());
}

#[test]
fn invalid_saved_config_fails_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config file");

    assert!(Config::load_from(temp_dir.path()).is_err());
}

#[test]
fn endpoint_handles_trailing_slash() {
    let mut api = ApiConfig::default();
    assert_eq!(
        api.endpoint("embeddings"),
        "https://api.openai.com/v1/embeddings"
    );

    api.base_url = "http://localhost:8080/v1/".to_string();
    assert_eq!(
        api.endpoint("chat/completions"),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn section_url_strips_spaces() {
    let citations = CitationConfig::default();
    let url = citations.section_url("Chapter 184A", "Section 2");
    assert_eq!(
        url,
        "https://malegislature.gov/Laws/GeneralLaws/PartII/TitleI/Chapter184A/Section2"
    );
    assert!(url.ends_with("/Chapter184A/Section2"));
}

#[test]
fn artifact_paths_live_in_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load_from(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.index_path(), temp_dir.path().join("statute_index.bin"));
    assert_eq!(
        config.metadata_path(),
        temp_dir.path().join("statute_metadata.json")
    );
    assert_eq!(config.config_file_path(), temp_dir.path().join("config.toml"));
}
