use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory holding the corpus snapshot (`.txt` files, one passage per line)
    pub dir: String,
    /// Base URL of the bulk-storage location used to populate a missing corpus.
    /// Expected to serve `manifest.json` listing the file names.
    #[serde(default)]
    pub remote_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Fixed on-disk location of the persisted index snapshot
    pub path: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// MMR balance factor: 0.0 = pure diversity, 1.0 = pure relevance
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

fn default_k() -> usize {
    3
}

fn default_fetch_k() -> usize {
    5
}

fn default_mmr_lambda() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> usize {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub corpus: CorpusConfig,
    pub logging: LoggingConfig,
    pub embeddings: EmbeddingsConfig,
    pub index: IndexConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::CharterQaError::Io)?;

        let config: AppConfig =
            toml::from_str(&content).map_err(crate::CharterQaError::TomlParsing)?;

        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::CharterQaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Get corpus directory
    pub fn corpus_dir(&self) -> &str {
        &self.corpus.dir
    }

    /// Get remote bulk-storage URL for corpus acquisition, if configured
    pub fn corpus_remote_url(&self) -> Option<&str> {
        self.corpus.remote_url.as_deref()
    }

    /// Get embedding dimension
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get persisted index path
    pub fn index_path(&self) -> &str {
        &self.index.path
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    /// Get LLM key
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig {
                dir: "./data".to_string(),
                remote_url: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
            },
            embeddings: EmbeddingsConfig {
                provider: "openai".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
            },
            index: IndexConfig {
                path: "./index/charterqa-index.json".to_string(),
                k: default_k(),
                fetch_k: default_fetch_k(),
                mmr_lambda: default_mmr_lambda(),
            },
            llm: LlmConfig {
                llm_endpoint: "https://api.openai.com/v1".to_string(),
                llm_key: String::new(),
                llm_model: default_llm_model(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [corpus]
            dir = "./data"
            remote_url = "https://storage.example.com/charter"

            [logging]
            level = "debug"
            backtrace = false

            [embeddings]
            provider = "ollama"
            endpoint = "http://localhost:11434"
            model = "all-minilm"
            dimension = 384

            [index]
            path = "./index/test.json"

            [llm]
            llm_endpoint = "http://localhost:11434"
            llm_key = "ollama"
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.corpus_dir(), "./data");
        assert_eq!(
            config.corpus_remote_url(),
            Some("https://storage.example.com/charter")
        );
        assert_eq!(config.embedding_dimension(), 384);
        // Defaults kick in for omitted retrieval policy keys
        assert_eq!(config.index.k, 3);
        assert_eq!(config.index.fetch_k, 5);
        assert!((config.index.mmr_lambda - 0.5).abs() < f32::EPSILON);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_config_is_consistent() {
        let config = AppConfig::default();
        assert!(config.index.fetch_k >= config.index.k);
        assert_eq!(config.llm_model(), "gpt-4o");
    }
}
