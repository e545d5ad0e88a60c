//! Operation catalog
//!
//! Registry of [`SignalOperation`]s keyed by kind. The catalog is built once
//! at startup and shared read-only.

use super::{
    AbsOperation, BinaryOperation, CandidateOperation, Derivative, FftOperation, FilterOperation,
    OperationKind, OperationRequest, OperationResult, OperationValidator, Parameters,
    ScaleOperation, StatsOperation,
};
use crate::data::{Dataset, Signal};
use crate::error::{OperationError, ValidationError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A deterministic transform with a declared contract
pub trait SignalOperation: Send + Sync {
    fn kind(&self) -> OperationKind;

    /// One-line description used in prompts and help text
    fn summary(&self) -> &'static str;

    /// Number of input signals
    fn arity(&self) -> usize {
        self.kind().arity()
    }

    /// JSON schema of the accepted parameters
    fn parameters(&self) -> Value;

    /// Domain checks for the parameters. May inject declared defaults and
    /// normalize numeric strings, nothing else.
    fn check(&self, _params: &mut Parameters) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Run on already resolved inputs.
    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError>;
}

pub struct OperationCatalog {
    operations: BTreeMap<OperationKind, Arc<dyn SignalOperation>>,
}

impl OperationCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            operations: BTreeMap::new(),
        }
    }

    /// Catalog with every built-in operation registered
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(BinaryOperation::add());
        catalog.register(BinaryOperation::subtract());
        catalog.register(BinaryOperation::multiply());
        catalog.register(BinaryOperation::divide());
        catalog.register(AbsOperation);
        catalog.register(ScaleOperation);
        catalog.register(Derivative);
        catalog.register(FilterOperation);
        catalog.register(FftOperation);
        catalog.register(StatsOperation);
        catalog
    }

    pub fn register<T: SignalOperation + 'static>(&mut self, operation: T) {
        self.operations.insert(operation.kind(), Arc::new(operation));
    }

    pub fn get(&self, kind: OperationKind) -> Option<Arc<dyn SignalOperation>> {
        self.operations.get(&kind).cloned()
    }

    /// Look up by name; unknown or unregistered names yield `None`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn SignalOperation>> {
        OperationKind::parse(name).and_then(|kind| self.get(kind))
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.operations.keys().copied().collect()
    }

    /// Operation contracts formatted for the assistant prompt
    pub fn prompt_section(&self) -> String {
        if self.operations.is_empty() {
            return "No operations available.\n".to_string();
        }

        let mut prompt = String::from("Available operations:\n");
        for (kind, op) in &self.operations {
            prompt.push_str(&format!(
                "- {}: {} (signals: {}, params: {})\n",
                kind,
                op.summary(),
                op.arity(),
                serde_json::to_string(&op.parameters()).unwrap_or_default()
            ));
        }
        prompt
    }

    /// Execute a validated request against the dataset.
    pub fn execute(
        &self,
        dataset: &Dataset,
        request: &OperationRequest,
    ) -> Result<OperationResult, OperationError> {
        let op = self
            .get(request.operation)
            .ok_or_else(|| OperationError::Unsupported(request.operation.to_string()))?;

        let inputs = request
            .signals
            .iter()
            .map(|name| {
                dataset
                    .signal(name)
                    .ok_or_else(|| ValidationError::SignalNotFound(name.clone()))
            })
            .collect::<Result<Vec<&Signal>, _>>()?;

        if inputs.len() != op.arity() {
            return Err(ValidationError::ArityMismatch {
                operation: request.operation.to_string(),
                expected: op.arity(),
                found: inputs.len(),
            }
            .into());
        }

        info!(
            "Executing {} on [{}] -> {}",
            request.operation,
            request.signals.join(", "),
            request.output_name
        );
        let result = op.execute(&inputs, &request.parameters)?;
        debug!("{} produced {} samples", request.operation, result.data.len());
        Ok(result)
    }

    /// Validate and execute in one step.
    pub fn run(
        &self,
        dataset: &Dataset,
        candidate: &CandidateOperation,
    ) -> Result<(OperationRequest, OperationResult), OperationError> {
        let request = OperationValidator::new(self).validate(candidate, dataset)?;
        let result = self.execute(dataset, &request)?;
        Ok((request, result))
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
