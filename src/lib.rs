use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistError>;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("API error: {0}")]
    Api(#[from] crate::openai::ApiError),

    #[error("Index error: {0}")]
    Index(String),

    #[error("No embeddings were obtained from documents")]
    EmptyIndex,

    #[error("Index artifacts not found at {0}. Build the vector index first")]
    MissingArtifacts(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod index;
pub mod openai;
pub mod retrieval;
pub mod session;
