//! Operation validator
//!
//! Single fail-fast pass: operation known, signals exist, arity matches,
//! parameters pass the operation's own checks. Parameters are only touched
//! to inject declared defaults or normalize numeric strings.

use super::{default_output_name, CandidateOperation, OperationCatalog, OperationRequest};
use crate::data::Dataset;
use crate::error::ValidationError;
use tracing::debug;

pub struct OperationValidator<'a> {
    catalog: &'a OperationCatalog,
}

impl<'a> OperationValidator<'a> {
    pub fn new(catalog: &'a OperationCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(
        &self,
        candidate: &CandidateOperation,
        dataset: &Dataset,
    ) -> Result<OperationRequest, ValidationError> {
        let op = self
            .catalog
            .lookup(&candidate.operation)
            .ok_or_else(|| ValidationError::UnknownOperation(candidate.operation.clone()))?;
        let kind = op.kind();

        if let Some(missing) = candidate.signals.iter().find(|s| !dataset.contains(s)) {
            return Err(ValidationError::SignalNotFound(missing.clone()));
        }

        if candidate.signals.len() != op.arity() {
            return Err(ValidationError::ArityMismatch {
                operation: kind.to_string(),
                expected: op.arity(),
                found: candidate.signals.len(),
            });
        }

        let mut parameters = candidate.parameters.clone();
        op.check(&mut parameters)?;

        let output_name = candidate
            .output_name
            .as_ref()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_output_name(kind, &candidate.signals));

        debug!("Validated {} on [{}]", kind, candidate.signals.join(", "));
        Ok(OperationRequest {
            operation: kind,
            signals: candidate.signals.clone(),
            parameters,
            output_name,
        })
    }
}
