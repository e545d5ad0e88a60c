//! Clarification handlers
//!
//! Turns whatever the resolver managed to identify (an operation kind, some
//! signals, maybe parameters) into either a validated request or a prompt
//! asking for exactly the piece that is missing.

use super::keywords::heuristic_parameters;
use super::ResolutionOutcome;
use crate::analytics::mentioned_signals;
use crate::config::Vocabulary;
use crate::data::Dataset;
use crate::error::{QueryError, ValidationError};
use crate::ops::{
    CandidateOperation, FilterType, OperationCatalog, OperationKind, OperationRequest,
    OperationValidator, Parameters,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// The one thing a clarification asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPiece {
    Operation,
    /// Unary operation with no signal, or more than one
    Signal,
    /// Binary operation with no signal at all
    Signals,
    SecondSignal,
    FilterType,
    FilterCutoff,
    FilterOrder,
    ScaleFactor,
    DerivativeOrder,
    SampleRate,
    Parameter,
}

impl MissingPiece {
    /// Map a parameter failure to the piece the user has to supply.
    pub fn from_detail(kind: OperationKind, detail: &str) -> Self {
        match kind {
            OperationKind::Filter if detail.contains("filter_type") => MissingPiece::FilterType,
            OperationKind::Filter if detail.contains("cutoff") => MissingPiece::FilterCutoff,
            OperationKind::Filter if detail.contains("order") => MissingPiece::FilterOrder,
            OperationKind::Scale => MissingPiece::ScaleFactor,
            OperationKind::Derivative => MissingPiece::DerivativeOrder,
            OperationKind::Fft => MissingPiece::SampleRate,
            _ => MissingPiece::Parameter,
        }
    }
}

/// Partial request plus the missing piece. `partial` is absent only when
/// the operation itself is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    pub partial: Option<OperationRequest>,
    pub missing: MissingPiece,
}

pub struct Clarifier {
    catalog: Arc<OperationCatalog>,
    vocabulary: Arc<Vocabulary>,
}

impl Clarifier {
    pub fn new(catalog: Arc<OperationCatalog>, vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            catalog,
            vocabulary,
        }
    }

    /// Build an outcome from an operation kind and the signals named in the
    /// query. `Ok(None)` when neither was found.
    pub fn assemble(
        &self,
        kind: Option<OperationKind>,
        signals: Vec<String>,
        query: &str,
        dataset: &Dataset,
    ) -> Result<Option<ResolutionOutcome>, QueryError> {
        self.assemble_with(kind, signals, Parameters::new(), query, dataset)
    }

    /// Recover from a validation failure on an assistant-proposed candidate,
    /// reusing what it got right and what the query text names.
    pub fn salvage(
        &self,
        candidate: &CandidateOperation,
        error: &ValidationError,
        query: &str,
        dataset: &Dataset,
    ) -> Result<Option<ResolutionOutcome>, QueryError> {
        info!("Salvaging {} candidate after {}", candidate.operation, error.kind());

        let kind = OperationKind::parse(&candidate.operation)
            .or_else(|| self.vocabulary.operation_in(query));

        let mut signals: Vec<String> = candidate
            .signals
            .iter()
            .filter(|s| dataset.contains(s))
            .cloned()
            .collect();
        for mention in mentioned_signals(query, dataset, &self.vocabulary) {
            if !signals.contains(&mention) {
                signals.push(mention);
            }
        }

        self.assemble_with(kind, signals, candidate.parameters.clone(), query, dataset)
    }

    fn assemble_with(
        &self,
        kind: Option<OperationKind>,
        mut signals: Vec<String>,
        base: Parameters,
        query: &str,
        dataset: &Dataset,
    ) -> Result<Option<ResolutionOutcome>, QueryError> {
        let Some(kind) = kind else {
            if signals.is_empty() {
                return Ok(None);
            }
            return Ok(Some(self.ask_operation(&signals)));
        };

        let missing = match (kind.arity(), signals.len()) {
            (2, 0) => Some(MissingPiece::Signals),
            (2, 1) => Some(MissingPiece::SecondSignal),
            (_, 0) => Some(MissingPiece::Signal),
            (1, n) if n > 1 => Some(MissingPiece::Signal),
            _ => None,
        };
        if let Some(missing) = missing {
            return Ok(Some(self.ask(kind, signals, missing, dataset, None)));
        }
        signals.truncate(kind.arity());

        let mut parameters = base;
        for (key, value) in heuristic_parameters(kind, query, dataset) {
            parameters.entry(key).or_insert(value);
        }
        let candidate = CandidateOperation {
            operation: kind.as_str().to_string(),
            signals: signals.clone(),
            parameters,
            output_name: None,
        };

        match OperationValidator::new(&self.catalog).validate(&candidate, dataset) {
            Ok(request) => {
                debug!("Assembled executable {} request", kind);
                let explanation = describe(&request);
                Ok(Some(ResolutionOutcome::operations(vec![request], explanation)))
            }
            Err(ValidationError::InvalidParameter { detail, .. }) => {
                let missing = MissingPiece::from_detail(kind, &detail);
                Ok(Some(self.ask(kind, signals, missing, dataset, Some(&detail))))
            }
            Err(other) => Err(other.into()),
        }
    }

    fn ask_operation(&self, signals: &[String]) -> ResolutionOutcome {
        let names = signals.join(" and ");
        let first = &signals[0];
        let text = format!(
            "I found {} in your request but not what to do with it. I can apply arithmetic \
             (add, subtract, multiply, divide), abs, scale, derivative, filter (lowpass, highpass, \
             bandpass, bandstop), fft or stats. For example: 'derivative of {}' or 'smooth {}'.",
            names, first, first
        );
        ResolutionOutcome::clarify(
            Clarification {
                partial: None,
                missing: MissingPiece::Operation,
            },
            text,
        )
    }

    fn ask(
        &self,
        kind: OperationKind,
        signals: Vec<String>,
        missing: MissingPiece,
        dataset: &Dataset,
        detail: Option<&str>,
    ) -> ResolutionOutcome {
        let text = prompt_text(kind, &signals, missing, dataset, detail);
        info!("Asking for {:?} to complete {}", missing, kind);
        ResolutionOutcome::clarify(
            Clarification {
                partial: Some(OperationRequest::partial(kind, signals)),
                missing,
            },
            text,
        )
    }
}

/// A dataset signal other than `taken`, for worked examples.
fn other_signal<'a>(dataset: &'a Dataset, taken: &str) -> &'a str {
    dataset
        .signal_names()
        .into_iter()
        .find(|n| *n != taken)
        .unwrap_or("otherSignal")
}

fn prompt_text(
    kind: OperationKind,
    signals: &[String],
    missing: MissingPiece,
    dataset: &Dataset,
    detail: Option<&str>,
) -> String {
    let available = dataset.signal_names().join(", ");
    let first_available = dataset.signal_names().first().copied().unwrap_or("signalA");
    let s = signals.first().map(String::as_str).unwrap_or(first_available);
    let op = kind.as_str();

    match missing {
        MissingPiece::Signals => format!(
            "Which two signals should I {}? For example: '{} {} and {}'. Available signals: {}.",
            op,
            op,
            s,
            other_signal(dataset, s),
            available
        ),
        MissingPiece::SecondSignal => format!(
            "I can {} {} with another signal. Which second signal should I use? \
             For example: '{} {} and {}'.",
            op,
            s,
            op,
            s,
            other_signal(dataset, s)
        ),
        MissingPiece::Signal if signals.len() > 1 => format!(
            "{} works on one signal at a time and I found {}. Which one should I use? \
             For example: '{} of {}'.",
            op,
            signals.join(", "),
            op,
            s
        ),
        MissingPiece::Signal => format!(
            "Which signal should I apply {} to? For example: '{} of {}'. Available signals: {}.",
            op, op, s, available
        ),
        MissingPiece::FilterType => format!(
            "What kind of filter should I apply to {}: lowpass, highpass, bandpass or bandstop? \
             For example: 'lowpass filter {} with cutoff 0.1'.",
            s, s
        ),
        MissingPiece::FilterCutoff => {
            let example = match detail.and_then(band_type) {
                Some(band) => format!("{} filter {} with cutoff 0.1 and 0.3", band.as_str(), s),
                None => format!("lowpass filter {} with cutoff 0.1", s),
            };
            format!(
                "I couldn't use that cutoff for filtering {} ({}). Cutoffs are fractions of the \
                 sample rate between 0 and 0.5. For example: '{}'.",
                s,
                detail.unwrap_or("missing cutoff"),
                example
            )
        }
        MissingPiece::FilterOrder => format!(
            "The filter order for {} must be a whole number between 1 and 8. \
             For example: 'lowpass filter {} with cutoff 0.1 and order 4'.",
            s, s
        ),
        MissingPiece::ScaleFactor => format!(
            "By what factor should I scale {}? For example: 'scale {} by 2'.",
            s, s
        ),
        MissingPiece::DerivativeOrder => format!(
            "I can take the first or second derivative of {}. Which one do you need? \
             For example: 'second derivative of {}'.",
            s, s
        ),
        MissingPiece::SampleRate => format!(
            "What sample rate in Hz should I use for the spectrum of {}? \
             For example: 'fft of {} with sample rate 100'.",
            s, s
        ),
        MissingPiece::Parameter | MissingPiece::Operation => format!(
            "I couldn't use the parameters for {} on {}: {}.",
            op,
            s,
            detail.unwrap_or("unrecognized parameters")
        ),
    }
}

fn band_type(detail: &str) -> Option<FilterType> {
    [FilterType::Bandpass, FilterType::Bandstop]
        .into_iter()
        .find(|t| detail.starts_with(t.as_str()))
}

/// One-line explanation of an executable request.
pub fn describe(request: &OperationRequest) -> String {
    let params: Vec<String> = request
        .parameters
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect();
    let mut text = format!(
        "Applying {} to {}",
        request.operation,
        request.signals.join(" and ")
    );
    if !params.is_empty() {
        text.push_str(" with ");
        text.push_str(&params.join(", "));
    }
    text.push_str(&format!(", saved as {}.", request.output_name));
    text
}
