//! Analytics answer engine
//!
//! Deterministic answers to questions about a loaded dataset: aggregates,
//! correlation, anomalies, summaries, time points and cursor readings. No
//! operation is produced and no external service is consulted.

pub mod aggregate;
pub mod anomaly;
pub mod classify;
pub mod correlation;
pub mod cursor;
pub mod summary;

pub use aggregate::Aggregate;
pub use anomaly::{detect_anomalies, Anomaly, ANOMALY_THRESHOLD};
pub use classify::{classify, mentioned_signals, target_signals, QueryCategory};
pub use correlation::{pearson, strength_label};
pub use cursor::{CursorComparison, TimeExpression, TimeParser};

use crate::config::Vocabulary;
use crate::data::{Dataset, QueryContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

pub const UNKNOWN_QUERY_HELP: &str = "I'm not sure how to answer that question about the data. \
Try asking about maximum, minimum, or average values, correlations between signals, anomalies, \
a general summary of the data, values at the cursor, or a comparison between the two cursors.";

/// Natural-language answer with a confidence in `[0, 1]`.
///
/// `metadata` is always an object with at least a `category` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub confidence: f64,
    pub metadata: Value,
}

impl Answer {
    pub fn new(category: &str, text: impl Into<String>, confidence: f64) -> Self {
        let mut metadata = Map::new();
        metadata.insert("category".into(), json!(category));
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            metadata: Value::Object(metadata),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata.get("category").and_then(Value::as_str)
    }
}

pub struct AnswerEngine {
    vocabulary: Arc<Vocabulary>,
    time_parser: TimeParser,
}

impl AnswerEngine {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Result<Self, regex::Error> {
        Ok(Self {
            vocabulary,
            time_parser: TimeParser::new()?,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn time_parser(&self) -> &TimeParser {
        &self.time_parser
    }

    pub fn classify(&self, query: &str) -> QueryCategory {
        classify(query, &self.vocabulary)
    }

    /// Answer any analytical question: time expressions first, then the
    /// keyword category.
    pub fn answer(&self, query: &str, dataset: &Dataset, context: Option<&QueryContext>) -> Answer {
        if let Some(expr) = self.time_parser.parse(query) {
            return self.time_point(&expr, query, dataset);
        }
        let category = self.classify(query);
        self.answer_category(category, query, dataset, context)
    }

    pub fn answer_category(
        &self,
        category: QueryCategory,
        query: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
    ) -> Answer {
        info!("Answering {} query", category);
        let targets = || target_signals(query, dataset, context, &self.vocabulary);
        match category {
            QueryCategory::Max => aggregate::answer(Aggregate::Max, &targets(), dataset),
            QueryCategory::Min => aggregate::answer(Aggregate::Min, &targets(), dataset),
            QueryCategory::Avg => aggregate::answer(Aggregate::Avg, &targets(), dataset),
            QueryCategory::Correlation => correlation::answer(&targets(), dataset),
            QueryCategory::Anomaly => anomaly::answer(&targets(), dataset),
            QueryCategory::Summary => summary::answer(dataset),
            QueryCategory::Cursor => self.cursor_values(query, dataset, context),
            QueryCategory::Compare => self.compare_cursors(query, dataset, context),
            QueryCategory::Unknown => Answer::new("unknown", UNKNOWN_QUERY_HELP, 0.3),
        }
    }

    /// Values at the sample nearest to an explicit time expression.
    pub fn time_point(&self, expr: &TimeExpression, query: &str, dataset: &Dataset) -> Answer {
        let mentioned = mentioned_signals(query, dataset, &self.vocabulary);
        cursor::time_point(expr, &mentioned, dataset)
    }

    pub fn cursor_values(
        &self,
        query: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
    ) -> Answer {
        let prefer_diff = self.vocabulary.mentions_diff_cursor(query);
        let signals = target_signals(query, dataset, context, &self.vocabulary);
        cursor::cursor_values(context, prefer_diff, &signals, dataset)
    }

    pub fn compare_cursors(
        &self,
        query: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
    ) -> Answer {
        let signals = target_signals(query, dataset, context, &self.vocabulary);
        cursor::compare(context, &signals, dataset)
    }
}
