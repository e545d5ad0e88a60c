//! Intent Resolver
//!
//! An ordered list of [`ResolverStage`]s. The driver tries each in turn and
//! stops at the first that produces an outcome; failures never escape as
//! errors, they become answers.

pub mod clarify;
pub mod keywords;
pub mod stages;

pub use clarify::{describe, Clarification, Clarifier, MissingPiece};
pub use stages::{
    help_answer, AnalyticsStage, ContextPatternStage, ExtractionStage, KeywordFallbackStage,
    ResolverStage, TerminalStage, TimestampStage,
};

use crate::analytics::{Answer, AnswerEngine};
use crate::assistant::Assistant;
use crate::config::Vocabulary;
use crate::data::{Dataset, QueryContext};
use crate::error::QueryError;
use crate::ops::{OperationCatalog, OperationRequest, OperationResult};
use crate::utils::preview;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The resolver's only output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Executable requests; empty with a `clarification` when something is
    /// missing.
    Operations {
        operations: Vec<OperationRequest>,
        explanation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clarification: Option<Clarification>,
    },
    Answer(Answer),
}

impl ResolutionOutcome {
    pub fn operations(operations: Vec<OperationRequest>, explanation: impl Into<String>) -> Self {
        ResolutionOutcome::Operations {
            operations,
            explanation: explanation.into(),
            clarification: None,
        }
    }

    pub fn clarify(clarification: Clarification, prompt: impl Into<String>) -> Self {
        ResolutionOutcome::Operations {
            operations: Vec::new(),
            explanation: prompt.into(),
            clarification: Some(clarification),
        }
    }

    /// Error answer for a stage that failed outright.
    pub fn failure(stage: &str, error: &QueryError) -> Self {
        let answer = Answer::new(
            "error",
            format!("I ran into a problem while interpreting your request: {}", error),
            0.0,
        )
        .with("error", error.kind())
        .with("stage", stage);
        ResolutionOutcome::Answer(answer)
    }

    /// The explanation or the answer text.
    pub fn text(&self) -> &str {
        match self {
            ResolutionOutcome::Operations { explanation, .. } => explanation,
            ResolutionOutcome::Answer(answer) => &answer.text,
        }
    }

    pub fn requests(&self) -> &[OperationRequest] {
        match self {
            ResolutionOutcome::Operations { operations, .. } => operations,
            ResolutionOutcome::Answer(_) => &[],
        }
    }

    pub fn clarification(&self) -> Option<&Clarification> {
        match self {
            ResolutionOutcome::Operations { clarification, .. } => clarification.as_ref(),
            ResolutionOutcome::Answer(_) => None,
        }
    }
}

/// A query as seen by every stage.
pub struct Query<'a> {
    pub text: &'a str,
    pub dataset: &'a Dataset,
    pub context: Option<&'a QueryContext>,
}

pub struct IntentResolver {
    stages: Vec<Box<dyn ResolverStage>>,
    catalog: Arc<OperationCatalog>,
    engine: Arc<AnswerEngine>,
}

impl IntentResolver {
    /// The standard cascade. Without an assistant the extraction stage is a
    /// pass-through.
    pub fn new(
        catalog: Arc<OperationCatalog>,
        vocabulary: Arc<Vocabulary>,
        assistant: Option<Assistant>,
    ) -> Result<Self, regex::Error> {
        let engine = Arc::new(AnswerEngine::new(vocabulary.clone())?);
        let clarifier = Arc::new(Clarifier::new(catalog.clone(), vocabulary.clone()));
        let stages: Vec<Box<dyn ResolverStage>> = vec![
            Box::new(ContextPatternStage::new(engine.clone())),
            Box::new(TimestampStage::new(engine.clone())),
            Box::new(AnalyticsStage::new(engine.clone())),
            Box::new(ExtractionStage::new(assistant, catalog.clone(), clarifier.clone())),
            Box::new(KeywordFallbackStage::new(vocabulary, clarifier)),
            Box::new(TerminalStage),
        ];
        Ok(Self::with_stages(catalog, engine, stages))
    }

    pub fn with_stages(
        catalog: Arc<OperationCatalog>,
        engine: Arc<AnswerEngine>,
        stages: Vec<Box<dyn ResolverStage>>,
    ) -> Self {
        Self {
            stages,
            catalog,
            engine,
        }
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &AnswerEngine {
        &self.engine
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve(
        &self,
        text: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
    ) -> ResolutionOutcome {
        info!("Resolving query: {}", preview(text, 80));
        let query = Query {
            text,
            dataset,
            context,
        };

        for stage in &self.stages {
            match stage.attempt(&query).await {
                Ok(Some(outcome)) => {
                    info!("Resolved by {} stage", stage.name());
                    return outcome;
                }
                Ok(None) => debug!("{} stage passed", stage.name()),
                Err(e) => {
                    warn!("{} stage failed: {}", stage.name(), e);
                    return ResolutionOutcome::failure(stage.name(), &e);
                }
            }
        }
        ResolutionOutcome::Answer(help_answer(dataset))
    }

    /// Resolve, then run every resulting request. An execution failure
    /// replaces the outcome with an error answer; results computed before
    /// it are kept.
    pub async fn resolve_and_execute(
        &self,
        text: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
    ) -> (ResolutionOutcome, Vec<OperationResult>) {
        let outcome = self.resolve(text, dataset, context).await;
        let mut results = Vec::with_capacity(outcome.requests().len());

        for request in outcome.requests() {
            match self.catalog.execute(dataset, request) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Execution of {} failed: {}", request.operation, e);
                    let answer = Answer::new(
                        "error",
                        format!(
                            "I couldn't run {} on {}: {}",
                            request.operation,
                            request.signals.join(" and "),
                            e
                        ),
                        0.0,
                    )
                    .with("error", e.kind())
                    .with("operation", request.operation.as_str());
                    return (ResolutionOutcome::Answer(answer), results);
                }
            }
        }
        (outcome, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::scenario_dataset;
    use async_trait::async_trait;

    fn resolver() -> IntentResolver {
        IntentResolver::new(
            Arc::new(OperationCatalog::standard()),
            Arc::new(Vocabulary::default()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            resolver().stage_names(),
            vec!["context", "timestamp", "analytics", "extraction", "keywords", "terminal"]
        );
    }

    #[tokio::test]
    async fn test_analytics_question_answered_directly() {
        let ds = scenario_dataset();
        let outcome = resolver().resolve("What is the maximum engineRPM?", &ds, None).await;
        match outcome {
            ResolutionOutcome::Answer(a) => {
                assert_eq!(a.text, "The maximum engineRPM recorded is 2980.00 rpm.");
                assert_eq!(a.confidence, 0.95);
            }
            other => panic!("expected answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_one_signal_clarifies() {
        let ds = scenario_dataset();
        let outcome = resolver().resolve("add engineRPM", &ds, None).await;
        assert!(outcome.requests().is_empty());
        let c = outcome.clarification().unwrap();
        assert_eq!(c.missing, MissingPiece::SecondSignal);
        assert!(outcome.text().contains("engineRPM"));
        assert!(outcome.text().contains("second signal"));
    }

    #[tokio::test]
    async fn test_keyword_operation_executes() {
        let ds = scenario_dataset();
        let (outcome, results) = resolver()
            .resolve_and_execute("add engineRPM and vehicleSpeed", &ds, None)
            .await;
        assert_eq!(outcome.requests().len(), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data[1], 1020.0 + 1.0);
    }

    #[tokio::test]
    async fn test_selected_signals_fill_in() {
        let ds = scenario_dataset();
        let ctx = QueryContext::default().with_selected_signals(&["vehicleSpeed"]);
        let outcome = resolver().resolve("take the derivative", &ds, Some(&ctx)).await;
        assert_eq!(outcome.requests()[0].signals, vec!["vehicleSpeed"]);
    }

    #[tokio::test]
    async fn test_terminal_help() {
        let ds = scenario_dataset();
        let outcome = resolver().resolve("hello there", &ds, None).await;
        match outcome {
            ResolutionOutcome::Answer(a) => {
                assert!(a.text.contains("engineRPM, vehicleSpeed"));
                assert_eq!(a.metadata["error"], "ambiguous_query");
            }
            other => panic!("expected help, got {:?}", other),
        }
    }

    struct Broken;

    #[async_trait]
    impl ResolverStage for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn attempt(&self, _query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
            Err(QueryError::AmbiguousQuery)
        }
    }

    #[tokio::test]
    async fn test_stage_error_becomes_answer() {
        let ds = scenario_dataset();
        let catalog = Arc::new(OperationCatalog::standard());
        let engine = Arc::new(AnswerEngine::new(Arc::new(Vocabulary::default())).unwrap());
        let r = IntentResolver::with_stages(catalog, engine, vec![Box::new(Broken)]);
        match r.resolve("anything", &ds, None).await {
            ResolutionOutcome::Answer(a) => {
                assert_eq!(a.confidence, 0.0);
                assert_eq!(a.metadata["stage"], "broken");
            }
            other => panic!("expected error answer, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ResolutionOutcome::operations(Vec::new(), "nothing to do");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "operations");
        assert!(json.get("clarification").is_none());

        let answer = ResolutionOutcome::Answer(Answer::new("max", "x", 0.9));
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["type"], "answer");
        assert_eq!(json["text"], "x");
    }
}
