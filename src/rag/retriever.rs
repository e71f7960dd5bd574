//! Retrieval over the vector index with a fixed policy

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::errors::Result;
use crate::index::VectorIndex;
use crate::rag::RetrievalMethod;
use crate::rag::SearchResult;

/// Retrieval policy: how many results, how wide a candidate pool, which method
#[derive(Debug, Clone, Copy)]
pub struct RetrievalPolicy {
    pub k: usize,
    pub fetch_k: usize,
    pub method: RetrievalMethod,
    /// MMR balance factor, ignored for `Similarity`
    pub mmr_lambda: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            k: 3,
            fetch_k: 5,
            method: RetrievalMethod::Mmr,
            mmr_lambda: 0.5,
        }
    }
}

impl RetrievalPolicy {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Self {
        Self {
            k: config.index.k,
            fetch_k: config.index.fetch_k,
            method: RetrievalMethod::Mmr,
            mmr_lambda: config.index.mmr_lambda,
        }
    }
}

/// Retriever wrapping the index with embedding and policy
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    policy: RetrievalPolicy,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, policy: RetrievalPolicy) -> Self {
        Self {
            index,
            embedder,
            policy,
        }
    }

    /// Retrieve the most relevant passages for a query.
    ///
    /// Every call re-embeds the query and re-searches; queries are not
    /// repeated at volume in this domain, so there is no result cache.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        debug!("Retrieving passages for query: {query}");

        let query_vector = self.embedder.embed(query).await?;
        self.index.search(
            &query_vector,
            self.policy.k,
            self.policy.fetch_k,
            self.policy.method,
            self.policy.mmr_lambda,
        )
    }

    /// Retrieve with naive similarity instead of the configured method
    pub async fn retrieve_similar(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(query).await?;
        self.index.search(
            &query_vector,
            k,
            k,
            RetrievalMethod::Similarity,
            self.policy.mmr_lambda,
        )
    }

    /// The active policy
    pub const fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    /// The underlying index
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}
