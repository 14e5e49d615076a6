//! Generation prompt assembly
//!
//! Merges retrieved passages, optional document-identity context, and
//! recent conversation turns into a single plain-string prompt. Section
//! order is fixed; the caller hands the result to the generation
//! capability.

use crate::retrieval::RetrievedPassage;

/// One prior question/answer exchange. Owned and persisted by the chat
/// history collaborator; the pipeline only reads the most recent turns,
/// oldest first.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Emitted in place of passage context when retrieval found nothing (or
/// degraded after a provider/store failure).
pub const NO_CONTEXT_PLACEHOLDER: &str =
    "No relevant document data was found for this question.";

const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

const INSTRUCTIONS: &str = "You are an assistant answering questions using the provided document \
context. Prioritize the document context below. If it does not contain the answer, say so and \
answer from general knowledge, clearly stating that the answer is not based on the documents. \
Never invent specifics the context does not support.";

/// Render the four labeled sections in fixed order: document identity (if
/// an anchor is present), passage context (or the explicit placeholder),
/// conversation history (oldest first), and the new question.
pub fn assemble(
    passages: &[RetrievedPassage],
    anchor: Option<&str>,
    history: &[ConversationTurn],
    question: &str,
) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\n");

    if let Some(anchor) = anchor {
        prompt.push_str("Document identity:\n");
        prompt.push_str(anchor);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Context:\n");
    if passages.is_empty() {
        prompt.push_str(NO_CONTEXT_PLACEHOLDER);
    } else {
        let joined: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        prompt.push_str(&joined.join(PASSAGE_SEPARATOR));
    }
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in history {
            prompt.push_str("User: ");
            prompt.push_str(&turn.question);
            prompt.push('\n');
            prompt.push_str("Assistant: ");
            prompt.push_str(&turn.answer);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Question:\n");
    prompt.push_str(question);
    prompt.push_str("\n\nAnswer clearly and concisely.");
    prompt
}
