//! Discrete differentiation.

use super::{coerce_number, single_input, OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::{OperationError, ValidationError};
use crate::utils::ordinal;
use serde_json::{json, Value};

/// Central differences in the interior, one-sided differences at both ends.
/// Unit sample spacing; output has the input's length.
pub fn gradient(samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut out = Vec::with_capacity(n);
            out.push(samples[1] - samples[0]);
            for i in 1..n - 1 {
                out.push((samples[i + 1] - samples[i - 1]) / 2.0);
            }
            out.push(samples[n - 1] - samples[n - 2]);
            out
        }
    }
}

pub struct Derivative;

impl Derivative {
    fn order(params: &Parameters) -> u64 {
        params.get("order").and_then(Value::as_u64).unwrap_or(1)
    }
}

impl SignalOperation for Derivative {
    fn kind(&self) -> OperationKind {
        OperationKind::Derivative
    }

    fn summary(&self) -> &'static str {
        "First or second derivative of a signal"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"order": {"type": "integer", "enum": [1, 2], "default": 1}}
        })
    }

    fn check(&self, params: &mut Parameters) -> Result<(), ValidationError> {
        let order = match params.get("order") {
            None | Some(Value::Null) => 1.0,
            Some(raw) => coerce_number(raw).ok_or_else(|| {
                ValidationError::invalid("derivative", format!("order must be 1 or 2, got {}", raw))
            })?,
        };
        if order != 1.0 && order != 2.0 {
            return Err(ValidationError::invalid(
                "derivative",
                format!("order must be 1 or 2, got {}", order),
            ));
        }
        params.insert("order".into(), json!(order as u64));
        Ok(())
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let signal = single_input(inputs, self.kind())?;
        if signal.len() < 2 {
            return Err(OperationError::InsufficientSamples {
                operation: self.kind().to_string(),
                needed: 2,
                found: signal.len(),
            });
        }

        let order = Self::order(params);
        let data = match order {
            1 => gradient(&signal.samples),
            2 => gradient(&gradient(&signal.samples)),
            other => {
                return Err(OperationError::InvalidInput(format!(
                    "unsupported derivative order {}",
                    other
                )))
            }
        };

        Ok(OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            params,
            format!("{} order derivative of {}", ordinal(order), signal.name),
            data,
        ))
    }
}
