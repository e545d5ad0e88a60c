//! Point-wise single-signal transforms.

use super::{number_param, single_input, OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::{OperationError, ValidationError};
use crate::utils::format_number;
use serde_json::{json, Value};

pub struct AbsOperation;

impl SignalOperation for AbsOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Abs
    }

    fn summary(&self) -> &'static str {
        "Absolute value of a signal"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let signal = single_input(inputs, self.kind())?;
        let data = signal.samples.iter().map(|v| v.abs()).collect();
        Ok(OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            params,
            format!("Absolute value of {}", signal.name),
            data,
        ))
    }
}

pub struct ScaleOperation;

impl SignalOperation for ScaleOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Scale
    }

    fn summary(&self) -> &'static str {
        "Multiply a signal by a constant factor"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"factor": {"type": "number", "description": "scaling factor"}},
            "required": ["factor"]
        })
    }

    fn check(&self, params: &mut Parameters) -> Result<(), ValidationError> {
        let Some(raw) = params.get("factor") else {
            return Err(ValidationError::invalid("scale", "factor is required"));
        };
        let factor = super::coerce_number(raw)
            .filter(|f| f.is_finite())
            .ok_or_else(|| {
                ValidationError::invalid("scale", format!("factor must be a finite number, got {}", raw))
            })?;
        params.insert("factor".into(), json!(factor));
        Ok(())
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let signal = single_input(inputs, self.kind())?;
        let factor = number_param(params, "factor").unwrap_or(1.0);
        let data = signal.samples.iter().map(|v| v * factor).collect();
        Ok(OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            params,
            format!("{} scaled by factor {}", signal.name, format_number(factor)),
            data,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs() {
        let s = Signal::new("x", vec![-1.5, 0.0, 2.0], "");
        let r = AbsOperation.execute(&[&s], &Parameters::new()).unwrap();
        assert_eq!(r.data, vec![1.5, 0.0, 2.0]);
        assert_eq!(r.description(), "Absolute value of x");
    }

    #[test]
    fn test_scale_coerces_string_factor() {
        let mut params = Parameters::new();
        params.insert("factor".into(), json!("2"));
        ScaleOperation.check(&mut params).unwrap();
        assert_eq!(params["factor"], json!(2.0));

        let s = Signal::new("x", vec![1.0, -2.0], "");
        let r = ScaleOperation.execute(&[&s], &params).unwrap();
        assert_eq!(r.data, vec![2.0, -4.0]);
        assert_eq!(r.description(), "x scaled by factor 2.0");
    }

    #[test]
    fn test_scale_requires_factor() {
        let mut params = Parameters::new();
        let err = ScaleOperation.check(&mut params).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");

        params.insert("factor".into(), json!("lots"));
        assert!(ScaleOperation.check(&mut params).is_err());
    }
}
