//! RAG (Retrieval-Augmented Generation) module
//!
//! This module provides end-to-end RAG functionality for querying governance
//! documents:
//! - Semantic retrieval over the persistent vector index
//! - Diversity-aware re-ranking (maximal marginal relevance)
//! - Grounded answer generation with a low-confidence signal
//! - A non-retrieval fallback strategy over the full rules text
//!
//! # Examples
//!
//! ```rust,no_run
//! use charterqa::rag::RagService;
//! use charterqa::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::new(&config)?;
//!
//!     let record = service.get_response("理事會多久開會一次？").await?;
//!     println!("Answer: {}", record.answer);
//!     println!("Context: {} passages", record.context.len());
//!
//!     Ok(())
//! }
//! ```

pub mod composer;
pub mod pipeline;
pub mod retriever;

pub use composer::AnswerComposer;
pub use composer::GroundedAnswer;
pub use pipeline::AnswerRecord;
pub use pipeline::RagService;
pub use retriever::RetrievalPolicy;
pub use retriever::Retriever;

use crate::corpus::Passage;

/// Maximum number of recent conversation turns carried into a query
pub const MAX_HISTORY: usize = 5;

/// Search result with relevance score
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub passage: Passage,
    pub score: f32,
}

/// Retrieval method for the index search stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMethod {
    /// Naive top-k by cosine similarity
    Similarity,
    /// Diversity-aware re-ranking (maximal marginal relevance)
    Mmr,
}

/// One completed conversation turn
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user: String,
    pub bot: String,
}

/// Render the most recent turns as `User:`/`Bot:` line pairs
pub fn render_history(history: &[ChatTurn]) -> String {
    let start = history.len().saturating_sub(MAX_HISTORY);
    history[start..]
        .iter()
        .map(|turn| format!("User: {}\nBot: {}", turn.user, turn.bot))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prepend the rendered transcript to the current query, the exact shape the
/// chat layer hands us.
pub fn compose_query_with_history(query: &str, history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return query.to_string();
    }

    format!("{}\n\nUser: {query}", render_history(history))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, bot: &str) -> ChatTurn {
        ChatTurn {
            user: user.to_string(),
            bot: bot.to_string(),
        }
    }

    #[test]
    fn test_no_history_is_plain_query() {
        assert_eq!(compose_query_with_history("問題", &[]), "問題");
    }

    #[test]
    fn test_history_is_prepended_as_transcript() {
        let history = vec![turn("你好", "您好，請問想查詢什麼規章？")];
        let composed = compose_query_with_history("理事會多久開會一次？", &history);
        assert_eq!(
            composed,
            "User: 你好\nBot: 您好，請問想查詢什麼規章？\n\nUser: 理事會多久開會一次？"
        );
    }

    #[test]
    fn test_history_is_capped_to_most_recent_turns() {
        let history: Vec<ChatTurn> = (0..8).map(|i| turn(&format!("q{i}"), "a")).collect();
        let composed = compose_query_with_history("now", &history);

        assert!(!composed.contains("q2"), "older turns are dropped");
        assert!(composed.contains("q3"), "exactly the last {MAX_HISTORY} turns remain");
        assert!(composed.contains("q7"));
    }
}
