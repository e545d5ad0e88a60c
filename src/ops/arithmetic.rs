//! Element-wise binary operations over two signals truncated to the shorter length.

use super::{OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::OperationError;
use serde_json::{json, Value};
use tracing::debug;

/// Smallest denominator magnitude allowed in `divide`.
pub const DIVIDE_EPSILON: f64 = 1e-10;

pub struct BinaryOperation {
    kind: OperationKind,
}

impl BinaryOperation {
    pub fn add() -> Self {
        Self {
            kind: OperationKind::Add,
        }
    }

    pub fn subtract() -> Self {
        Self {
            kind: OperationKind::Subtract,
        }
    }

    pub fn multiply() -> Self {
        Self {
            kind: OperationKind::Multiply,
        }
    }

    pub fn divide() -> Self {
        Self {
            kind: OperationKind::Divide,
        }
    }

    fn describe(&self, a: &str, b: &str) -> String {
        match self.kind {
            OperationKind::Subtract => format!("{} minus {}", a, b),
            OperationKind::Multiply => format!("Product of {} and {}", a, b),
            OperationKind::Divide => format!("{} divided by {}", a, b),
            _ => format!("Sum of {} and {}", a, b),
        }
    }
}

/// Clamp a near-zero denominator to ±`DIVIDE_EPSILON`; zero becomes positive.
fn guard_denominator(value: f64) -> f64 {
    if value.abs() < DIVIDE_EPSILON {
        if value < 0.0 {
            -DIVIDE_EPSILON
        } else {
            DIVIDE_EPSILON
        }
    } else {
        value
    }
}

/// `a / b` element-wise with clamped denominators.
pub fn safe_divide(a: &[f64], b: &[f64]) -> Vec<f64> {
    let clamped = b.iter().take(a.len()).filter(|v| v.abs() < DIVIDE_EPSILON).count();
    if clamped > 0 {
        debug!(
            "divide: clamped {} near-zero denominator(s) to {:e}",
            clamped, DIVIDE_EPSILON
        );
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| x / guard_denominator(*y))
        .collect()
}

impl SignalOperation for BinaryOperation {
    fn kind(&self) -> OperationKind {
        self.kind
    }

    fn summary(&self) -> &'static str {
        match self.kind {
            OperationKind::Subtract => "Subtract the second signal from the first",
            OperationKind::Multiply => "Multiply two signals element-wise",
            OperationKind::Divide => "Divide the first signal by the second",
            _ => "Add two signals element-wise",
        }
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let [first, second] = inputs else {
            return Err(OperationError::InvalidInput(format!(
                "{} expects two signals",
                self.kind
            )));
        };
        let a = &first.samples;
        let b = &second.samples;
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);

        let data: Vec<f64> = match self.kind {
            OperationKind::Subtract => a.iter().zip(b).map(|(x, y)| x - y).collect(),
            OperationKind::Multiply => a.iter().zip(b).map(|(x, y)| x * y).collect(),
            OperationKind::Divide => safe_divide(a, b),
            _ => a.iter().zip(b).map(|(x, y)| x + y).collect(),
        };

        Ok(OperationResult::new(
            self.kind,
            &[first.name.as_str(), second.name.as_str()],
            params,
            self.describe(&first.name, &second.name),
            data,
        ))
    }
}
