//! Question answering over the retrieval pipeline
//!
//! Wires retrieval, prompt assembly, and the external generation capability
//! into the ask-question flow. Retrieval-time provider/store failures never
//! block answering: they degrade to context-free generation with the
//! disclosed placeholder. Generation failures are surfaced to the caller,
//! distinct from retrieval errors.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::context::{assemble, ConversationTurn};
use crate::error::{Result, VellumError};
use crate::partition::{resolve_partition, IngestMode, ReingestPolicy};
use crate::retrieval::Retriever;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation backend failed: {0}")]
    Backend(String),

    #[error("Generation call timed out")]
    Timeout,
}

/// The opaque text-completion capability consumed by the pipeline. The
/// hosting application implements this against its model of choice;
/// answer persistence also stays on that side.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, GenerationError>;
}

/// A question scoped the same way ingestion was.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub question: String,
    pub tenant_id: String,
    pub mode: IngestMode,
    pub subject_id: Option<String>,
    /// Prior turns, oldest first; only the most recent `history_limit` are
    /// used.
    pub history: Vec<ConversationTurn>,
}

pub struct AnswerFlow {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    history_limit: usize,
}

impl AnswerFlow {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, history_limit: usize) -> Self {
        Self {
            retriever,
            generator,
            history_limit,
        }
    }

    /// Answer one question: retrieve → assemble → generate.
    pub async fn answer(&self, request: AskRequest) -> Result<String> {
        if request.question.trim().is_empty() {
            return Err(VellumError::Validation(
                "question must not be empty".to_string(),
            ));
        }

        let passages = match self
            .retriever
            .retrieve_scoped(
                &request.question,
                &request.mode,
                &request.tenant_id,
                request.subject_id.as_deref(),
            )
            .await
        {
            Ok(passages) => passages,
            // Invalid intent is the caller's problem; backend trouble is not.
            Err(err @ VellumError::Validation(_)) => return Err(err),
            Err(err) => {
                warn!(error = %err, "retrieval failed, answering without document context");
                Vec::new()
            }
        };

        let anchor = if request.mode.is_shared() {
            match resolve_partition(
                &request.mode,
                &request.tenant_id,
                request.subject_id.as_deref(),
                ReingestPolicy::Overwrite,
            ) {
                Ok(partition) => self.retriever.fetch_anchor(&partition).await,
                Err(_) => None,
            }
        } else {
            None
        };

        let history_start = request.history.len().saturating_sub(self.history_limit);
        let prompt = assemble(
            &passages,
            anchor.as_deref(),
            &request.history[history_start..],
            &request.question,
        );

        let answer = self
            .generator
            .complete(&prompt)
            .await
            .map_err(VellumError::Generation)?;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_CONTEXT_PLACEHOLDER;
    use crate::embedding::MockEmbedProvider;
    use crate::retrieval::RetrieverOptions;
    use crate::store::{MemoryVectorStore, MetadataFilter, ScoredMatch, StoreError, VectorRecord, VectorStore};
    use std::sync::Mutex;

    /// Captures the prompt and returns a canned answer.
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    impl EchoGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("an answer".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
            Err(GenerationError::Backend("model offline".to_string()))
        }
    }

    /// Store whose queries always fail, for exercising degradation.
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn upsert(
            &self,
            _namespace: &str,
            _records: Vec<VectorRecord>,
        ) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn query(
            &self,
            _namespace: &str,
            _vector: &[f32],
            _top_k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> std::result::Result<Vec<ScoredMatch>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn fetch(
            &self,
            _namespace: &str,
            _ids: &[String],
        ) -> std::result::Result<Vec<VectorRecord>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn delete_by_filter(
            &self,
            _namespace: &str,
            _filter: &MetadataFilter,
        ) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    fn ask(question: &str) -> AskRequest {
        AskRequest {
            question: question.to_string(),
            tenant_id: "u1".to_string(),
            mode: IngestMode::parse("qa").unwrap(),
            subject_id: None,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn store_failure_degrades_to_placeholder_context() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedProvider::new(16)),
            Arc::new(BrokenStore),
            RetrieverOptions::default(),
        );
        let generator = EchoGenerator::new();
        let flow = AnswerFlow::new(retriever, generator.clone(), 6);

        let answer = flow.answer(ask("what is in my documents?")).await.unwrap();
        assert_eq!(answer, "an answer");
        assert!(generator.last_prompt().contains(NO_CONTEXT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced_distinctly() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedProvider::new(16)),
            Arc::new(MemoryVectorStore::new()),
            RetrieverOptions::default(),
        );
        let flow = AnswerFlow::new(retriever, Arc::new(FailingGenerator), 6);

        let err = flow.answer(ask("a question")).await.unwrap_err();
        assert!(matches!(err, VellumError::Generation(_)));
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_retrieval() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedProvider::new(16)),
            Arc::new(BrokenStore),
            RetrieverOptions::default(),
        );
        let flow = AnswerFlow::new(retriever, EchoGenerator::new(), 6);

        let err = flow.answer(ask("  ")).await.unwrap_err();
        assert!(matches!(err, VellumError::Validation(_)));
    }

    #[tokio::test]
    async fn history_is_truncated_to_limit_keeping_newest() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedProvider::new(16)),
            Arc::new(MemoryVectorStore::new()),
            RetrieverOptions::default(),
        );
        let generator = EchoGenerator::new();
        let flow = AnswerFlow::new(retriever, generator.clone(), 2);

        let mut request = ask("next question");
        request.history = (0..5)
            .map(|i| ConversationTurn {
                question: format!("question {i}"),
                answer: format!("answer {i}"),
            })
            .collect();
        flow.answer(request).await.unwrap();

        let prompt = generator.last_prompt();
        assert!(!prompt.contains("question 2"));
        assert!(prompt.contains("question 3"));
        assert!(prompt.contains("question 4"));
        let third = prompt.find("question 3").unwrap();
        let fourth = prompt.find("question 4").unwrap();
        assert!(third < fourth);
    }
}
