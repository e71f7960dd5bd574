pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod logging;
pub mod quiz;
pub mod rag;

pub use config::AppConfig;
pub use errors::*;
