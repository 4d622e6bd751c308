//! Graph RAG (Retrieval-Augmented Generation) Service.
//!
//! Answers natural-language questions from the crime-investigation graph.
//!
//! # Architecture
//!
//! ```text
//! Question: "Which gangs operate in Pilsen?"
//!     │
//!     ▼
//! GraphRagService.answer()
//!     │
//!     ├──▶ validate (length, NUL) ──✗──▶ apology, no sources
//!     │
//!     ▼
//! ContextAssembler.assemble()
//!     │
//!     ├──▶ database_stats           (always)
//!     ├──▶ all_organizations, ...   (keyword rules)
//!     └──▶ crimes_in_Pilsen, ...    (per entity, with carry-over)
//!     │
//!     ▼
//! GenerativeComposer.compose() ──✗──▶ FallbackFormatter.format()
//!     │
//!     ▼
//! Answer { answer, sources: mapping keys }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use crimegraph::services::GraphRagService;
//!
//! let service = GraphRagService::new(datastore, llm, RetrievalConfig::default());
//! let answer = service.answer("Tell me more about West Side Crew", &history);
//! println!("{}", answer.answer);
//! ```

use super::retrieval::ContextAssembler;
use super::synthesis::{FallbackFormatter, GenerativeComposer};
use crate::config::RetrievalConfig;
use crate::llm::LlmProvider;
use crate::models::{Answer, ChatTurn, ContextMapping};
use crate::storage::GraphDatastore;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Answer returned when a question cannot be processed at all.
pub const APOLOGY: &str =
    "I'm sorry, I couldn't work that one out. Could you try rephrasing the question?";

/// Which strategy produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStrategy {
    /// The generative backend.
    Generative,
    /// The deterministic formatter.
    Fallback,
    /// The question was rejected.
    Apology,
}

impl AnswerStrategy {
    /// Returns the metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generative => "generative",
            Self::Fallback => "fallback",
            Self::Apology => "apology",
        }
    }
}

/// Question answering over the crime graph.
pub struct GraphRagService {
    assembler: ContextAssembler,
    composer: Option<GenerativeComposer>,
    max_question_chars: usize,
}

impl GraphRagService {
    /// Creates the service.
    ///
    /// Passing `None` for `llm` pins the service to fallback answers for its
    /// whole lifetime.
    #[must_use]
    pub fn new(
        datastore: Arc<dyn GraphDatastore>,
        llm: Option<Arc<dyn LlmProvider>>,
        config: RetrievalConfig,
    ) -> Self {
        let composer = llm.map(|provider| GenerativeComposer::new(provider, &config));
        if composer.is_none() {
            tracing::info!("No generative backend, answers will use the fallback formatter");
        }
        Self {
            max_question_chars: config.max_question_chars,
            assembler: ContextAssembler::new(datastore, config),
            composer,
        }
    }

    /// Returns whether a generative backend is configured.
    #[must_use]
    pub const fn has_generative_backend(&self) -> bool {
        self.composer.is_some()
    }

    /// Checks a question before any retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the question is too long or contains NUL.
    pub fn validate_question(&self, question: &str) -> Result<()> {
        let chars = question.chars().count();
        if chars > self.max_question_chars {
            return Err(Error::InvalidInput(format!(
                "question is {chars} characters, limit is {}",
                self.max_question_chars
            )));
        }
        if question.contains('\0') {
            return Err(Error::InvalidInput("question contains NUL".to_string()));
        }
        Ok(())
    }

    /// Assembles the context mapping without answering.
    #[must_use]
    pub fn retrieve(&self, question: &str, history: &[ChatTurn]) -> ContextMapping {
        self.assembler.assemble(question, history)
    }

    /// Answers a question. Never fails: backend failures fall back to the
    /// formatter, and rejected questions get an apology.
    #[instrument(
        skip(self, question, history),
        fields(operation = "answer", question_chars = question.len(), strategy = tracing::field::Empty)
    )]
    pub fn answer(&self, question: &str, history: &[ChatTurn]) -> Answer {
        let start = Instant::now();
        let (answer, strategy) = self.answer_inner(question, history);

        tracing::Span::current().record("strategy", strategy.as_str());
        metrics::counter!("graph_rag_answers_total", "strategy" => strategy.as_str()).increment(1);
        metrics::histogram!("graph_rag_answer_duration_ms", "strategy" => strategy.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        answer
    }

    fn answer_inner(&self, question: &str, history: &[ChatTurn]) -> (Answer, AnswerStrategy) {
        if let Err(e) = self.validate_question(question) {
            tracing::warn!(error = %e, "Question rejected");
            let apology = Answer {
                answer: APOLOGY.to_string(),
                sources: Vec::new(),
            };
            return (apology, AnswerStrategy::Apology);
        }

        let mapping = self.assembler.assemble(question, history);
        let sources = mapping.keys();

        if let Some(composer) = &self.composer {
            match composer.compose(question, &mapping, history) {
                Ok(text) => {
                    let answer = Answer {
                        answer: text,
                        sources,
                    };
                    return (answer, AnswerStrategy::Generative);
                },
                Err(e) => {
                    tracing::warn!(
                        provider = composer.provider_name(),
                        error = %e,
                        "Generative answer failed, using fallback"
                    );
                },
            }
        }

        let answer = Answer {
            answer: FallbackFormatter::format(&mapping),
            sources,
        };
        (answer, AnswerStrategy::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, CompletionOptions};
    use crate::models::STATS_TOPIC;
    use crate::storage::InMemoryDatastore;

    struct Fixed(Option<&'static str>);

    impl LlmProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn complete_chat(&self, _: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            self.0.map(ToString::to_string).ok_or_else(|| Error::Backend {
                provider: "fixed".to_string(),
                cause: "connection refused".to_string(),
            })
        }
    }

    fn service(llm: Option<Arc<dyn LlmProvider>>) -> GraphRagService {
        GraphRagService::new(
            Arc::new(InMemoryDatastore::new()),
            llm,
            RetrievalConfig::default(),
        )
    }

    #[test]
    fn test_generative_answer_verbatim() {
        let service = service(Some(Arc::new(Fixed(Some("The **Loop** is quiet.")))));
        assert!(service.has_generative_backend());
        let answer = service.answer("hello", &[]);
        assert_eq!(answer.answer, "The **Loop** is quiet.");
        assert_eq!(answer.sources, vec![STATS_TOPIC]);
    }

    #[test]
    fn test_backend_failure_falls_back() {
        let service = service(Some(Arc::new(Fixed(None))));
        let answer = service.answer("hello", &[]);
        assert!(answer.answer.starts_with("**📊 Database Overview:**"));
        assert_eq!(answer.sources, vec![STATS_TOPIC]);
    }

    #[test]
    fn test_no_backend_uses_fallback() {
        let service = service(None);
        assert!(!service.has_generative_backend());
        let answer = service.answer("", &[]);
        assert!(answer.answer.contains("- Crimes: 0"));
    }

    #[test]
    fn test_oversized_question_gets_apology() {
        let service = service(None);
        let answer = service.answer(&"a".repeat(4_001), &[]);
        assert_eq!(answer.answer, APOLOGY);
        assert!(answer.sources.is_empty());

        let answer = service.answer("bad\0input", &[]);
        assert_eq!(answer.answer, APOLOGY);
    }

    #[test]
    fn test_validate_question_limit_is_inclusive() {
        let service = service(None);
        assert!(service.validate_question(&"é".repeat(4_000)).is_ok());
        assert!(service.validate_question(&"é".repeat(4_001)).is_err());
    }
}
