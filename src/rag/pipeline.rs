//! Complete RAG pipeline: load-or-build -> retrieve -> compose
//!
//! `RagService` is the orchestration facade: an explicit context object
//! constructed once at process start and passed by reference into request
//! handlers. The index is built or loaded lazily on first query under a
//! `tokio::sync::OnceCell`, so exactly one initialization sequence runs even
//! when callers race on first use, and the outcome - success or failure - is
//! memoized for the remaining process lifetime.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::corpus::CorpusFetcher;
use crate::corpus::HttpCorpusFetcher;
use crate::corpus::Passage;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingService;
use crate::errors::CharterQaError;
use crate::errors::Result;
use crate::index::VectorIndex;
use crate::llm::ChatMessage;
use crate::llm::ChatModel;
use crate::llm::LlmService;
use crate::rag::compose_query_with_history;
use crate::rag::AnswerComposer;
use crate::rag::ChatTurn;
use crate::rag::RetrievalPolicy;
use crate::rag::Retriever;

const FALLBACK_SYSTEM_PROMPT: &str =
    "你是基金會規章專家，請根據條文內容與使用者上下文進行回答，請避免捏造內容，\
可說明你參考了哪一段原文。回答所使用的語言一定要是zh-tw。";

/// Structured result of one query
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// The full query string handed to retrieval (history included)
    pub query: String,
    /// Supporting passages, in retrieval order
    pub context: Vec<Passage>,
    pub answer: String,
    /// Heuristic signal: the model emitted the unsure marker
    pub confidence_low: bool,
}

/// Memoized retrieval state built on first use
struct RetrievalState {
    index: Arc<VectorIndex>,
    retriever: Retriever,
}

/// Orchestration facade over loader, embedder, index, retriever and composer
pub struct RagService {
    config: AppConfig,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    fetcher: Option<Arc<dyn CorpusFetcher>>,
    composer: AnswerComposer,
    // The stringified error keeps failed initialization memoized too:
    // a failed first use is fatal for the process lifetime, never retried.
    state: OnceCell<std::result::Result<Arc<RetrievalState>, String>>,
}

impl RagService {
    /// Create the facade from configuration.
    ///
    /// Construction is cheap and side-effect free; corpus loading, embedding
    /// and index persistence happen on first query.
    ///
    /// # Errors
    /// - Embedding service configuration errors (unknown provider)
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingService::new(config)?);
        let chat_model: Arc<dyn ChatModel> = Arc::new(LlmService::new(config)?);

        let fetcher: Option<Arc<dyn CorpusFetcher>> = match config.corpus_remote_url() {
            Some(url) => Some(Arc::new(HttpCorpusFetcher::new(url)?)),
            None => None,
        };

        Ok(Self::from_services(
            config.clone(),
            embedder,
            chat_model,
            fetcher,
        ))
    }

    /// Create from existing services (test seam and custom wiring)
    pub fn from_services(
        config: AppConfig,
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
        fetcher: Option<Arc<dyn CorpusFetcher>>,
    ) -> Self {
        let composer = AnswerComposer::new(
            chat_model.clone(),
            config.llm.temperature,
            config.llm.max_tokens,
        );

        Self {
            config,
            embedder,
            chat_model,
            fetcher,
            composer,
            state: OnceCell::new(),
        }
    }

    /// Answer a plain query.
    ///
    /// # Errors
    /// - `Initialization` when first-use build-or-load failed (also for every
    ///   later call in that process)
    /// - Embedding or LLM upstream failures for this request
    pub async fn get_response(&self, query: &str) -> Result<AnswerRecord> {
        info!("Processing query: {query}");
        let state = self.state().await?;

        debug!("Step 1: Retrieving passages");
        let results = state.retriever.retrieve(query).await?;
        debug!("Retrieved {} passages", results.len());

        debug!("Step 2: Composing grounded answer");
        let grounded = self.composer.answer(query, &results).await?;

        if grounded.confidence_low {
            warn!("Low-confidence answer for query: {query}");
        }

        Ok(AnswerRecord {
            query: query.to_string(),
            context: results.into_iter().map(|r| r.passage).collect(),
            answer: grounded.answer,
            confidence_low: grounded.confidence_low,
        })
    }

    /// Answer a query with recent conversation turns prepended
    pub async fn get_response_with_history(
        &self,
        query: &str,
        history: &[ChatTurn],
    ) -> Result<AnswerRecord> {
        let full_query = compose_query_with_history(query, history);
        self.get_response(&full_query).await
    }

    /// Secondary, non-retrieval-grounded strategy: answer from the FULL rules
    /// text instead of retrieved passages.
    ///
    /// The facade never invokes this itself; the caller decides to re-issue a
    /// query here when `confidence_low` was set.
    pub async fn fallback_response(&self, query: &str, history: &[ChatTurn]) -> Result<String> {
        info!("Processing fallback query: {query}");
        let state = self.state().await?;

        let all_rules: Vec<String> = state
            .index
            .passages()
            .into_iter()
            .map(|p| p.content)
            .collect();

        let history_block = if history.is_empty() {
            String::new()
        } else {
            format!("\n\n對話歷史：\n{}", crate::rag::render_history(history))
        };

        let prompt = format!(
            "條文如下：\n{}{history_block}\n\n使用者提問：{query}",
            all_rules.join("\n")
        );

        let messages = [
            ChatMessage::system(FALLBACK_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        self.chat_model
            .generate(
                &messages,
                self.config.llm.temperature,
                self.config.llm.max_tokens,
            )
            .await
    }

    /// Fetch the corpus from bulk storage into the configured directory,
    /// overwriting any files already there, and report how many passages the
    /// refreshed directory holds. Operator-triggered; requires a configured
    /// remote location.
    ///
    /// # Errors
    /// - `Config` when no remote corpus location is configured
    /// - Fetch or load failures
    pub async fn fetch_corpus(&self) -> Result<usize> {
        let Some(fetcher) = &self.fetcher else {
            return Err(CharterQaError::Config(
                "corpus.remote_url is not configured".to_string(),
            ));
        };

        let dir = self.config.corpus_dir().to_string();
        fetcher.fetch(std::path::Path::new(&dir)).await?;
        let passages = crate::corpus::load_corpus(&dir)?;
        Ok(passages.len())
    }

    /// Rebuild the index from the corpus and persist it, replacing any
    /// existing snapshot. Used by operators after a corpus update.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let passages = self.load_corpus_with_acquisition().await?;
        let index = VectorIndex::build_with_model(
            &passages,
            self.embedder.as_ref(),
            self.config.embedding_model(),
        )
        .await?;
        index.persist(self.config.index_path())?;
        Ok(index.len())
    }

    /// Number of indexed passages, initializing on first use
    pub async fn index_len(&self) -> Result<usize> {
        Ok(self.state().await?.index.len())
    }

    /// Memoized first-use initialization
    async fn state(&self) -> Result<Arc<RetrievalState>> {
        let memoized = self
            .state
            .get_or_init(|| async {
                match self.initialize().await {
                    Ok(state) => Ok(Arc::new(state)),
                    Err(e) => {
                        warn!("Initialization failed: {e}");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        match memoized {
            Ok(state) => Ok(state.clone()),
            Err(msg) => Err(CharterQaError::Initialization(msg.clone())),
        }
    }

    /// Build-or-load sequence, run exactly once per process
    async fn initialize(&self) -> Result<RetrievalState> {
        let index_path = self.config.index_path();

        let index = if VectorIndex::snapshot_exists(index_path) {
            info!("Loading persisted index from {index_path}");
            VectorIndex::load(index_path, self.config.embedding_model())?
        } else {
            info!("No persisted index at {index_path}, building from corpus");
            let passages = self.load_corpus_with_acquisition().await?;
            let index = VectorIndex::build_with_model(
                &passages,
                self.embedder.as_ref(),
                self.config.embedding_model(),
            )
            .await?;
            index.persist(index_path)?;
            index
        };

        let index = Arc::new(index);
        let retriever = Retriever::new(
            index.clone(),
            self.embedder.clone(),
            RetrievalPolicy::from_app_config(&self.config),
        );

        Ok(RetrievalState { index, retriever })
    }

    /// Load the corpus, triggering acquisition and retrying exactly once if
    /// the directory is missing or empty.
    async fn load_corpus_with_acquisition(&self) -> Result<Vec<Passage>> {
        let dir = self.config.corpus_dir().to_string();

        match crate::corpus::load_corpus(&dir) {
            Ok(passages) => Ok(passages),
            Err(CharterQaError::CorpusUnavailable(reason)) => {
                let Some(fetcher) = &self.fetcher else {
                    return Err(CharterQaError::CorpusUnavailable(reason));
                };
                warn!("Corpus unavailable ({reason}), requesting acquisition");
                fetcher.fetch(std::path::Path::new(&dir)).await?;
                crate::corpus::load_corpus(&dir)
            }
            Err(e) => Err(e),
        }
    }
}
