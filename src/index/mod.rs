//! Persistent vector index over corpus passages
//!
//! Built once from a full passage set (batch embedding) or restored from a
//! JSON snapshot at a fixed path, never mutated incrementally. Search is a
//! two-stage policy: fetch the `fetch_k` nearest candidates by cosine
//! similarity on the raw embedding space, then optionally re-rank for
//! diversity with maximal marginal relevance.
//!
//! The snapshot records the embedding model identifier and loading checks it
//! against the configured model: vectors from a different model occupy a
//! different space and comparing them is meaningless. A snapshot built from
//! an older corpus, however, is NOT detected; rebuild explicitly after
//! changing the corpus.

pub mod mmr;

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::corpus::Passage;
use crate::embeddings::Embedder;
use crate::errors::CharterQaError;
use crate::errors::Result;
use crate::rag::RetrievalMethod;
use crate::rag::SearchResult;

/// One indexed passage with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    passage: Passage,
    vector: Vec<f32>,
}

/// Persisted snapshot layout
#[derive(Serialize, Deserialize)]
struct SerializedIndex {
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// In-memory vector index with JSON persistence
#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build the index by embedding every passage in one batched pass.
    ///
    /// # Errors
    /// - Embedding failures from the provider
    /// - Dimension mismatches between provider output and configuration
    pub async fn build(passages: &[Passage], embedder: &dyn Embedder) -> Result<Self> {
        info!("Building vector index over {} passages", passages.len());

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != passages.len() {
            return Err(CharterQaError::Embedding(format!(
                "embedder returned {} vectors for {} passages",
                vectors.len(),
                passages.len()
            )));
        }

        let dimension = embedder.dimension();
        let mut entries = Vec::with_capacity(passages.len());
        for (passage, vector) in passages.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(CharterQaError::Embedding(format!(
                    "embedding for passage {} has dimension {}, expected {dimension}",
                    passage.id,
                    vector.len()
                )));
            }
            entries.push(IndexEntry {
                passage: passage.clone(),
                vector,
            });
        }

        Ok(Self {
            model: String::new(),
            dimension,
            entries,
        })
    }

    /// Build and tag with the embedding model identifier
    pub async fn build_with_model(
        passages: &[Passage],
        embedder: &dyn Embedder,
        model: &str,
    ) -> Result<Self> {
        let mut index = Self::build(passages, embedder).await?;
        index.model = model.to_string();
        Ok(index)
    }

    /// Persist the index snapshot to disk
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = SerializedIndex {
            model: self.model.clone(),
            dimension: self.dimension,
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        std::fs::write(path, bytes)?;

        info!(
            "Persisted vector index ({} entries) to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Restore a previously persisted index without re-embedding.
    ///
    /// # Errors
    /// - `Index` if the file is unreadable, malformed, or was built with a
    ///   different embedding model than `expected_model`
    pub fn load<P: AsRef<Path>>(path: P, expected_model: &str) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CharterQaError::Index(format!("cannot read {}: {e}", path.display())))?;
        let snapshot: SerializedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| CharterQaError::Index(format!("malformed snapshot: {e}")))?;

        if snapshot.model != expected_model {
            return Err(CharterQaError::Index(format!(
                "snapshot was built with embedding model '{}', configuration expects '{expected_model}'",
                snapshot.model
            )));
        }

        info!(
            "Loaded vector index ({} entries) from {}",
            snapshot.entries.len(),
            path.display()
        );
        Ok(Self {
            model: snapshot.model,
            dimension: snapshot.dimension,
            entries: snapshot.entries,
        })
    }

    /// Whether a usable snapshot exists at `path`
    pub fn snapshot_exists<P: AsRef<Path>>(path: P) -> bool {
        std::fs::metadata(path.as_ref()).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// Search for the `k` most relevant passages.
    ///
    /// Stage one ranks all entries by cosine similarity and keeps the top
    /// `fetch_k`; stage two either truncates to `k` (`Similarity`) or applies
    /// MMR with the given lambda (`Mmr`).
    pub fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        fetch_k: usize,
        method: RetrievalMethod,
        lambda: f32,
    ) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.dimension {
            return Err(CharterQaError::Index(format!(
                "query vector has dimension {}, index expects {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let fetch_k = fetch_k.max(k);

        // Stage one: nearest candidates by similarity
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (mmr::cosine_similarity(query_vector, &entry.vector), idx))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(fetch_k);

        debug!(
            "Search: {} candidates fetched for k={k} ({method:?})",
            scored.len()
        );

        // Stage two: final selection
        let picks: Vec<(f32, usize)> = match method {
            RetrievalMethod::Similarity => scored.into_iter().take(k).collect(),
            RetrievalMethod::Mmr => {
                let candidates: Vec<(f32, Vec<f32>)> = scored
                    .iter()
                    .map(|&(score, idx)| (score, self.entries[idx].vector.clone()))
                    .collect();
                let order = mmr::mmr_select(&candidates, k, lambda);
                order.into_iter().map(|pos| scored[pos]).collect()
            }
        };

        Ok(picks
            .into_iter()
            .map(|(score, idx)| SearchResult {
                passage: self.entries[idx].passage.clone(),
                score,
            })
            .collect())
    }

    /// Number of indexed passages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding model identifier the index was built with
    pub fn model(&self) -> &str {
        &self.model
    }

    /// All indexed passages, in id order
    pub fn passages(&self) -> Vec<Passage> {
        self.entries.iter().map(|e| e.passage.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Deterministic embedder backed by a fixed text → vector table
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| CharterQaError::Embedding(format!("no vector for '{text}'")))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn board_meeting_fixture() -> (Vec<Passage>, TableEmbedder) {
        // Two near-duplicate board-meeting clauses and one receipt clause
        let passages = vec![
            Passage {
                id: 0,
                content: "理事會每年召開一次會議".to_string(),
            },
            Passage {
                id: 1,
                content: "理事會每年召開一次會議。".to_string(),
            },
            Passage {
                id: 2,
                content: "捐款人可要求開立收據".to_string(),
            },
        ];
        let table = HashMap::from([
            ("理事會每年召開一次會議".to_string(), vec![0.99, 0.01, 0.0]),
            ("理事會每年召開一次會議。".to_string(), vec![0.98, 0.02, 0.0]),
            ("捐款人可要求開立收據".to_string(), vec![0.1, 0.0, 0.9]),
        ]);
        (
            passages,
            TableEmbedder {
                table,
                dimension: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_build_indexes_every_passage() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build(&passages, &embedder).await.unwrap();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_search_returns_duplicates() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build(&passages, &embedder).await.unwrap();

        // Query close to the board-meeting clauses
        let query = vec![1.0, 0.0, 0.0];
        let results = index
            .search(&query, 2, 5, RetrievalMethod::Similarity, 0.5)
            .unwrap();

        let ids: Vec<u32> = results.iter().map(|r| r.passage.id).collect();
        assert_eq!(ids, vec![0, 1], "naive top-k keeps both near-duplicates");
    }

    #[tokio::test]
    async fn test_mmr_search_diversifies_near_duplicates() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build(&passages, &embedder).await.unwrap();

        let query = vec![1.0, 0.0, 0.0];
        let results = index
            .search(&query, 2, 5, RetrievalMethod::Mmr, 0.5)
            .unwrap();

        let ids: Vec<u32> = results.iter().map(|r| r.passage.id).collect();
        assert_eq!(ids[0], 0);
        let duplicates = ids.iter().filter(|&&id| id == 0 || id == 1).count();
        assert_eq!(
            duplicates, 1,
            "MMR must keep at most one of the duplicate clauses"
        );
        assert!(ids.contains(&2), "the distinct receipt clause is included");
    }

    #[tokio::test]
    async fn test_persist_load_round_trip_preserves_search() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build_with_model(&passages, &embedder, "test-model")
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.json");
        index.persist(&path).unwrap();
        assert!(VectorIndex::snapshot_exists(&path));

        let restored = VectorIndex::load(&path, "test-model").unwrap();

        let query = vec![1.0, 0.0, 0.0];
        let fresh = index
            .search(&query, 3, 5, RetrievalMethod::Mmr, 0.5)
            .unwrap();
        let loaded = restored
            .search(&query, 3, 5, RetrievalMethod::Mmr, 0.5)
            .unwrap();

        let fresh_ids: Vec<u32> = fresh.iter().map(|r| r.passage.id).collect();
        let loaded_ids: Vec<u32> = loaded.iter().map(|r| r.passage.id).collect();
        assert_eq!(fresh_ids, loaded_ids);
    }

    #[tokio::test]
    async fn test_load_rejects_model_mismatch() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build_with_model(&passages, &embedder, "model-a")
            .await
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.json");
        index.persist(&path).unwrap();

        let err = VectorIndex::load(&path, "model-b").unwrap_err();
        assert!(matches!(err, CharterQaError::Index(_)));
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_query_dimension() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build(&passages, &embedder).await.unwrap();

        let err = index
            .search(&[1.0, 0.0], 2, 5, RetrievalMethod::Similarity, 0.5)
            .unwrap_err();
        assert!(matches!(err, CharterQaError::Index(_)));
    }

    #[tokio::test]
    async fn test_fetch_k_never_below_k() {
        let (passages, embedder) = board_meeting_fixture();
        let index = VectorIndex::build(&passages, &embedder).await.unwrap();

        // fetch_k smaller than k is widened to k
        let results = index
            .search(&[1.0, 0.0, 0.0], 3, 1, RetrievalMethod::Similarity, 0.5)
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_snapshot_exists_on_missing_file() {
        assert!(!VectorIndex::snapshot_exists("/no/such/snapshot.json"));
    }
}
