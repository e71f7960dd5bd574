//! Quiz question generation from the rules text
//!
//! Prompts the chat model for one single-choice question over the governance
//! documents and parses the line-oriented reply (題目/選項/答案). Previously
//! asked questions are listed in the prompt so the model avoids repeats.

use tracing::debug;

use crate::errors::CharterQaError;
use crate::errors::Result;
use crate::llm::ChatMessage;
use crate::llm::ChatModel;

/// One parsed single-choice quiz question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    /// Options in presentation order, each prefixed `A.`/`B.`/`C.`
    pub options: Vec<String>,
    /// The correct option letter, e.g. `A`
    pub answer: String,
}

fn build_prompt(rules: &str, asked: &[String]) -> String {
    let past_questions = if asked.is_empty() {
        "（無）".to_string()
    } else {
        asked
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "你是一位基金會規章老師，請根據以下規章條文出 1 題單選測驗題，\
並提供三個選項與正確答案。題目需簡短清楚，選項避免模糊不清，\
不要加入條文原文，只根據條文出題。\n\n\
請不要重複出現以下這些題目：\n{past_questions}\n\n\
規章條文如下：\n{rules}\n\n\
請輸出格式如下：\n題目：...\n選項：\nA. ...\nB. ...\nC. ...\n答案：A"
    )
}

/// Parse the model's line-oriented reply into a `QuizQuestion`.
///
/// # Errors
/// `QuizParse` when the 題目, 選項 or 答案 lines are missing.
pub fn parse_quiz_reply(reply: &str) -> Result<QuizQuestion> {
    let lines: Vec<&str> = reply.lines().map(str::trim).collect();

    let question = lines
        .iter()
        .find_map(|l| l.strip_prefix("題目："))
        .map(str::trim)
        .ok_or_else(|| CharterQaError::QuizParse("missing 題目 line".to_string()))?;

    let options: Vec<String> = lines
        .iter()
        .filter(|l| l.starts_with("A.") || l.starts_with("B.") || l.starts_with("C."))
        .map(|l| (*l).to_string())
        .collect();
    if options.len() != 3 {
        return Err(CharterQaError::QuizParse(format!(
            "expected 3 options, found {}",
            options.len()
        )));
    }

    let answer = lines
        .iter()
        .find_map(|l| l.strip_prefix("答案："))
        .map(str::trim)
        .ok_or_else(|| CharterQaError::QuizParse("missing 答案 line".to_string()))?;
    if !matches!(answer, "A" | "B" | "C") {
        return Err(CharterQaError::QuizParse(format!(
            "answer must be A, B or C, got '{answer}'"
        )));
    }

    Ok(QuizQuestion {
        question: question.to_string(),
        options,
        answer: answer.to_string(),
    })
}

/// Generate one quiz question over `rules`, avoiding `asked` questions.
///
/// # Errors
/// - LLM upstream failures
/// - `QuizParse` when the reply does not follow the requested format
pub async fn generate_quiz(
    chat_model: &dyn ChatModel,
    rules: &str,
    asked: &[String],
) -> Result<QuizQuestion> {
    let prompt = build_prompt(rules, asked);
    debug!("Generating quiz question ({} avoided)", asked.len());

    let messages = [ChatMessage::user(prompt)];
    let reply = chat_model.generate(&messages, 0.7, 1000).await?;

    parse_quiz_reply(&reply)
}
