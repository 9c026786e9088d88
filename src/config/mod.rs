// Configuration management module
// Handles TOML settings plus the interactive setup flow

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ApiConfig, CitationConfig, Config, ConfigError, DEFAULT_BASE_PROMPT, RetrievalConfig,
    SessionConfig,
};
