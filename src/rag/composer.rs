//! Grounded answer composition
//!
//! Builds the single structured prompt (system instruction, concatenated
//! context passages, user query), invokes the chat model, and derives the
//! low-confidence signal from the literal `unsure` marker the system
//! instruction asks the model to emit when the context is insufficient.

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::llm::ChatMessage;
use crate::llm::ChatModel;
use crate::rag::SearchResult;

/// Literal marker the model emits when the retrieved context is insufficient
pub const UNSURE_MARKER: &str = "unsure";

/// Upper bound on assembled context length, in bytes
const MAX_CONTEXT_LENGTH: usize = 4000;

const SYSTEM_PROMPT: &str = "你是規章QA機器人, 目的是為了將複雜的規章用淺顯易懂的方式回答，\
並熟知規章出處為何，回答所使用的語言一定要是zh-tw。\
如果你無法在 context 中找到足夠資訊，請明確回答 'unsure' 即可";

/// Answer plus the heuristic confidence signal
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub answer: String,
    pub confidence_low: bool,
}

/// Composer merging retrieved passages into a grounded prompt
pub struct AnswerComposer {
    chat_model: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: usize,
}

impl AnswerComposer {
    /// Create a new composer
    pub fn new(chat_model: Arc<dyn ChatModel>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            chat_model,
            temperature,
            max_tokens,
        }
    }

    /// Generate a grounded answer from the query and retrieved context.
    ///
    /// # Errors
    /// - LLM generation errors (API failures, timeouts, malformed responses)
    pub async fn answer(&self, query: &str, context: &[SearchResult]) -> Result<GroundedAnswer> {
        let context_block = assemble_context(context);
        debug!("Assembled context block of {} bytes", context_block.len());

        let messages = [
            ChatMessage::system(format!("{SYSTEM_PROMPT}\n\nContext:\n{context_block}")),
            ChatMessage::user(query),
        ];

        let answer = self
            .chat_model
            .generate(&messages, self.temperature, self.max_tokens)
            .await?;

        let confidence_low = is_low_confidence(&answer);
        Ok(GroundedAnswer {
            answer,
            confidence_low,
        })
    }
}

/// Concatenate retrieved passages into a numbered context block, capped at
/// `MAX_CONTEXT_LENGTH` bytes.
pub fn assemble_context(results: &[SearchResult]) -> String {
    let mut context = String::new();
    let mut total_length = 0;

    for (idx, result) in results.iter().enumerate() {
        let entry = format!("[{}] {}\n", idx + 1, result.passage.content);

        if total_length + entry.len() > MAX_CONTEXT_LENGTH {
            break;
        }

        context.push_str(&entry);
        total_length += entry.len();
    }

    context
}

/// Case-insensitive exact-substring check for the unsure marker.
/// "Unsure." matches; "un sure" does not. No fuzzy matching.
pub fn is_low_confidence(answer: &str) -> bool {
    answer.to_lowercase().contains(UNSURE_MARKER)
}
