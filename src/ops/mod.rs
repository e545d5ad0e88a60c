//! Signal Operation Module
//!
//! Deterministic transforms over one or two named signals. Requests flow
//! through the validator (which fills defaults) before the catalog executes
//! them.

mod arithmetic;
mod calculus;
mod catalog;
mod filter;
mod spectrum;
mod stats;
mod transform;
pub mod validator;

pub use arithmetic::BinaryOperation;
pub use calculus::{gradient, Derivative};
pub use catalog::{OperationCatalog, SignalOperation};
pub use filter::{butterworth, filtfilt, Cutoff, FilterDesign, FilterOperation, FilterSpec, FilterType};
pub use spectrum::{magnitude_spectrum, FftOperation};
pub use stats::{mean, std_dev, SignalStatistics, StatsOperation};
pub use transform::{AbsOperation, ScaleOperation};
pub use validator::OperationValidator;

use crate::data::Signal;
use crate::error::OperationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Parameter mapping carried by a request
pub type Parameters = Map<String, Value>;

/// Every operation the catalog knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Abs,
    Scale,
    Derivative,
    Filter,
    Fft,
    Stats,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        OperationKind::Add,
        OperationKind::Subtract,
        OperationKind::Multiply,
        OperationKind::Divide,
        OperationKind::Abs,
        OperationKind::Scale,
        OperationKind::Derivative,
        OperationKind::Filter,
        OperationKind::Fft,
        OperationKind::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Subtract => "subtract",
            OperationKind::Multiply => "multiply",
            OperationKind::Divide => "divide",
            OperationKind::Abs => "abs",
            OperationKind::Scale => "scale",
            OperationKind::Derivative => "derivative",
            OperationKind::Filter => "filter",
            OperationKind::Fft => "fft",
            OperationKind::Stats => "stats",
        }
    }

    /// Case-insensitive lookup by name
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            OperationKind::Add | OperationKind::Subtract | OperationKind::Multiply | OperationKind::Divide
        )
    }

    pub fn arity(&self) -> usize {
        if self.is_binary() {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated request, as produced by the assistant or built by hand.
///
/// Only [`OperationValidator::validate`] turns this into an
/// [`OperationRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateOperation {
    pub operation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signals: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

/// Assistants sometimes send `null` where an empty collection is meant.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl CandidateOperation {
    pub fn new(operation: impl Into<String>, signals: &[&str]) -> Self {
        Self {
            operation: operation.into(),
            signals: signals.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// Validated, executable request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation: OperationKind,
    pub signals: Vec<String>,
    #[serde(default)]
    pub parameters: Parameters,
    pub output_name: String,
}

impl OperationRequest {
    /// Request with no parameters, used for partial requests in clarifications.
    pub fn partial(operation: OperationKind, signals: Vec<String>) -> Self {
        let output_name = default_output_name(operation, &signals);
        Self {
            operation,
            signals,
            parameters: Parameters::new(),
            output_name,
        }
    }
}

pub(crate) fn default_output_name(operation: OperationKind, signals: &[String]) -> String {
    match signals.first() {
        Some(first) => format!("{}_{}", first, operation),
        None => operation.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub operation: OperationKind,
    pub inputs: Vec<String>,
    pub parameters: Parameters,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_axis: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SignalStatistics>,
}

/// Derived signal plus descriptive metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub data: Vec<f64>,
    pub metadata: ResultMetadata,
}

impl OperationResult {
    pub fn new(
        operation: OperationKind,
        inputs: &[&str],
        parameters: &Parameters,
        description: impl Into<String>,
        data: Vec<f64>,
    ) -> Self {
        Self {
            data,
            metadata: ResultMetadata {
                operation,
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                parameters: parameters.clone(),
                description: description.into(),
                frequency_axis: None,
                x_label: None,
                y_label: None,
                statistics: None,
            },
        }
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }
}

/// Read a number, accepting numeric strings.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn single_input<'a>(
    inputs: &[&'a Signal],
    kind: OperationKind,
) -> Result<&'a Signal, OperationError> {
    match inputs {
        [signal] => Ok(*signal),
        _ => Err(OperationError::InvalidInput(format!(
            "{} expects exactly one signal",
            kind
        ))),
    }
}

pub(crate) fn number_param(params: &Parameters, key: &str) -> Option<f64> {
    params.get(key).and_then(coerce_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(OperationKind::parse(" FFT "), Some(OperationKind::Fft));
        assert_eq!(OperationKind::parse("integrate"), None);
        assert_eq!(OperationKind::Divide.arity(), 2);
        assert_eq!(OperationKind::Stats.arity(), 1);
    }

    #[test]
    fn test_candidate_deserializes_with_defaults() {
        let c: CandidateOperation =
            serde_json::from_value(json!({"operation": "abs", "signals": ["x"]})).unwrap();
        assert!(c.parameters.is_empty());
        assert!(c.output_name.is_none());

        let c: CandidateOperation =
            serde_json::from_value(json!({"operation": "abs", "signals": ["x"], "parameters": null}))
                .unwrap();
        assert!(c.parameters.is_empty());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(2)), Some(2.0));
        assert_eq!(coerce_number(&json!("0.25")), Some(0.25));
        assert_eq!(coerce_number(&json!("fast")), None);
        assert_eq!(coerce_number(&json!([1])), None);
    }

    #[test]
    fn test_partial_request_name() {
        let req = OperationRequest::partial(OperationKind::Add, vec!["engineRPM".into()]);
        assert_eq!(req.output_name, "engineRPM_add");
        assert!(req.parameters.is_empty());
    }
}
