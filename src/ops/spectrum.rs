//! Frequency spectrum.

use super::{number_param, single_input, OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::{OperationError, ValidationError};
use crate::utils::format_number;
use rustfft::{num_complex::Complex, FftPlanner};
use serde_json::{json, Value};

/// Magnitudes of the non-negative frequency bins, paired with their
/// frequencies in Hz. No windowing, padding or normalization.
pub fn magnitude_spectrum(samples: &[f64], sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    let n = samples.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    let bins = (n + 1) / 2;
    let freqs = (0..bins)
        .map(|k| k as f64 * sample_rate / n as f64)
        .collect();
    let magnitude = buffer.iter().take(bins).map(|c| c.norm()).collect();
    (freqs, magnitude)
}

pub struct FftOperation;

impl SignalOperation for FftOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Fft
    }

    fn summary(&self) -> &'static str {
        "Magnitude spectrum of a signal"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"sample_rate": {"type": "number", "description": "samples per second"}},
            "required": ["sample_rate"]
        })
    }

    fn check(&self, params: &mut Parameters) -> Result<(), ValidationError> {
        let rate = number_param(params, "sample_rate")
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| ValidationError::invalid("fft", "sample_rate must be a positive number"))?;
        params.insert("sample_rate".into(), json!(rate));
        Ok(())
    }

    fn execute(
        &self,
        inputs: &[&Signal],
        params: &Parameters,
    ) -> Result<OperationResult, OperationError> {
        let signal = single_input(inputs, self.kind())?;
        if signal.is_empty() {
            return Err(OperationError::InsufficientSamples {
                operation: self.kind().to_string(),
                needed: 1,
                found: 0,
            });
        }
        let rate = number_param(params, "sample_rate")
            .filter(|r| *r > 0.0)
            .ok_or_else(|| OperationError::InvalidInput("sample_rate must be positive".into()))?;

        let (freqs, magnitude) = magnitude_spectrum(&signal.samples, rate);
        let mut result = OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            params,
            format!(
                "Frequency spectrum of {} (sample rate {} Hz)",
                signal.name,
                format_number(rate)
            ),
            magnitude,
        );
        result.metadata.frequency_axis = Some(freqs);
        result.metadata.x_label = Some("Frequency (Hz)".into());
        result.metadata.y_label = Some("Magnitude".into());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_bin_count_and_axis() {
        let (f, m) = magnitude_spectrum(&[1.0; 8], 8.0);
        assert_eq!(f, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(m.len(), 4);
        assert!((m[0] - 8.0).abs() < 1e-9);
        assert!(m[1..].iter().all(|v| v.abs() < 1e-9));

        let (f, _) = magnitude_spectrum(&[0.0; 5], 5.0);
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn test_sine_peak() {
        let rate = 100.0;
        let samples: Vec<f64> = (0..200)
            .map(|i| (2.0 * PI * 10.0 * i as f64 / rate).sin())
            .collect();
        let (f, m) = magnitude_spectrum(&samples, rate);
        let peak = m
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!((f[peak] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_execute_metadata() {
        let s = Signal::new("x", vec![0.0, 1.0, 0.0, -1.0], "");
        let mut params = Parameters::new();
        params.insert("sample_rate".into(), json!("4"));
        FftOperation.check(&mut params).unwrap();
        let r = FftOperation.execute(&[&s], &params).unwrap();
        assert_eq!(r.data.len(), 2);
        assert_eq!(r.metadata.frequency_axis.as_ref().map(Vec::len), Some(2));
        assert_eq!(r.description(), "Frequency spectrum of x (sample rate 4.0 Hz)");
        assert_eq!(r.metadata.x_label.as_deref(), Some("Frequency (Hz)"));
    }

    #[test]
    fn test_sample_rate_required() {
        let mut params = Parameters::new();
        assert!(FftOperation.check(&mut params).is_err());
        params.insert("sample_rate".into(), json!(-1));
        assert!(FftOperation.check(&mut params).is_err());
    }
}
