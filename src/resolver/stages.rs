//! Resolver stages, in cascade order.

use super::clarify::Clarifier;
use super::{Query, ResolutionOutcome};
use crate::analytics::{mentioned_signals, Answer, AnswerEngine, QueryCategory};
use crate::assistant::Assistant;
use crate::config::Vocabulary;
use crate::data::Dataset;
use crate::error::QueryError;
use crate::ops::{OperationCatalog, OperationKind, OperationValidator};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One step of the cascade. `Ok(None)` hands the query to the next stage;
/// an error ends resolution with an error answer.
#[async_trait]
pub trait ResolverStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError>;
}

/// Cursor and two-cursor questions, when the context has a cursor.
pub struct ContextPatternStage {
    engine: Arc<AnswerEngine>,
}

impl ContextPatternStage {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ResolverStage for ContextPatternStage {
    fn name(&self) -> &'static str {
        "context"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        let Some(context) = query.context.filter(|c| c.has_any_cursor()) else {
            return Ok(None);
        };
        let vocabulary = self.engine.vocabulary();
        let answer = if vocabulary.mentions_comparison(query.text) {
            self.engine
                .compare_cursors(query.text, query.dataset, Some(context))
        } else if vocabulary.mentions_cursor(query.text) {
            self.engine
                .cursor_values(query.text, query.dataset, Some(context))
        } else {
            return Ok(None);
        };
        Ok(Some(ResolutionOutcome::Answer(answer)))
    }
}

/// "... at 2.5 seconds"
pub struct TimestampStage {
    engine: Arc<AnswerEngine>,
}

impl TimestampStage {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ResolverStage for TimestampStage {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        Ok(self.engine.time_parser().parse(query.text).map(|expr| {
            debug!("Time expression {}{} -> {}s", expr.value, expr.unit, expr.seconds);
            ResolutionOutcome::Answer(self.engine.time_point(&expr, query.text, query.dataset))
        }))
    }
}

/// Analytical questions that name no operation.
pub struct AnalyticsStage {
    engine: Arc<AnswerEngine>,
}

impl AnalyticsStage {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ResolverStage for AnalyticsStage {
    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        let category = self.engine.classify(query.text);
        if category == QueryCategory::Unknown {
            return Ok(None);
        }
        if let Some(op) = self.engine.vocabulary().operation_in(query.text) {
            debug!("{} query names operation {}; not answering directly", category, op);
            return Ok(None);
        }
        Ok(Some(ResolutionOutcome::Answer(self.engine.answer_category(
            category,
            query.text,
            query.dataset,
            query.context,
        ))))
    }
}

/// Assistant extraction plus validation. Any assistant failure falls
/// through silently to the keyword stage.
pub struct ExtractionStage {
    assistant: Option<Assistant>,
    catalog: Arc<OperationCatalog>,
    clarifier: Arc<Clarifier>,
}

impl ExtractionStage {
    pub fn new(
        assistant: Option<Assistant>,
        catalog: Arc<OperationCatalog>,
        clarifier: Arc<Clarifier>,
    ) -> Self {
        Self {
            assistant,
            catalog,
            clarifier,
        }
    }
}

#[async_trait]
impl ResolverStage for ExtractionStage {
    fn name(&self) -> &'static str {
        "extraction"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        let Some(assistant) = &self.assistant else {
            debug!("No assistant configured");
            return Ok(None);
        };

        let reply = match assistant
            .extract(query.text, query.dataset, query.context, &self.catalog)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                info!("Falling back to keyword extraction: {}", e);
                return Ok(None);
            }
        };

        if reply.operations.is_empty() {
            info!("Assistant proposed no operations");
            return Ok(Some(ResolutionOutcome::operations(Vec::new(), reply.explanation)));
        }

        let validator = OperationValidator::new(&self.catalog);
        let mut requests = Vec::with_capacity(reply.operations.len());
        for mut candidate in reply.operations {
            if OperationKind::parse(&candidate.operation) == Some(OperationKind::Fft)
                && !candidate.parameters.contains_key("sample_rate")
            {
                let rate = query.dataset.metadata().sample_rate;
                if rate > 0.0 {
                    candidate.parameters.insert("sample_rate".into(), json!(rate));
                }
            }
            match validator.validate(&candidate, query.dataset) {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!("Assistant proposed an invalid operation: {}", e);
                    return self
                        .clarifier
                        .salvage(&candidate, &e, query.text, query.dataset);
                }
            }
        }
        Ok(Some(ResolutionOutcome::operations(requests, reply.explanation)))
    }
}

/// Keyword dictionary plus signal mentions.
pub struct KeywordFallbackStage {
    vocabulary: Arc<Vocabulary>,
    clarifier: Arc<Clarifier>,
}

impl KeywordFallbackStage {
    pub fn new(vocabulary: Arc<Vocabulary>, clarifier: Arc<Clarifier>) -> Self {
        Self {
            vocabulary,
            clarifier,
        }
    }
}

#[async_trait]
impl ResolverStage for KeywordFallbackStage {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        let kind = self.vocabulary.operation_in(query.text);
        let mut signals = mentioned_signals(query.text, query.dataset, &self.vocabulary);

        // selections only stand in for signals when an operation was named
        if signals.is_empty() && kind.is_some() {
            if let Some(context) = query.context {
                signals = context
                    .selected_signals
                    .iter()
                    .filter(|s| query.dataset.contains(s))
                    .cloned()
                    .collect();
            }
        }

        debug!(
            "Keyword match: operation {:?}, signals [{}]",
            kind,
            signals.join(", ")
        );
        self.clarifier
            .assemble(kind, signals, query.text, query.dataset)
    }
}

/// Always answers.
pub struct TerminalStage;

#[async_trait]
impl ResolverStage for TerminalStage {
    fn name(&self) -> &'static str {
        "terminal"
    }

    async fn attempt(&self, query: &Query<'_>) -> Result<Option<ResolutionOutcome>, QueryError> {
        Ok(Some(ResolutionOutcome::Answer(help_answer(query.dataset))))
    }
}

/// Generic help listing what can be asked and which signals exist.
pub fn help_answer(dataset: &Dataset) -> Answer {
    let names = dataset.signal_names();
    let first = names.first().copied().unwrap_or("signalA");
    let second = names.get(1).copied().unwrap_or(first);
    let text = format!(
        "I couldn't identify an operation or a signal in your request. I can answer questions \
         about the data (maximum, minimum, average, correlation, anomalies, summary, cursor values) \
         or apply operations: arithmetic (add, subtract, multiply, divide), abs, scale, derivative, \
         filter, fft and stats. Available signals: {}. For example: 'What is the maximum {}?' or \
         'add {} and {}'.",
        names.join(", "),
        first,
        first,
        second
    );
    Answer::new("help", text, 0.3).with("error", QueryError::AmbiguousQuery.kind())
}
