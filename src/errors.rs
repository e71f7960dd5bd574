use thiserror::Error;

#[derive(Error, Debug)]
pub enum CharterQaError {
    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quiz parse error: {0}")]
    QuizParse(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CharterQaError>;
