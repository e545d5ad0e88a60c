//! Descriptive statistics. The signal passes through unchanged.

use super::{single_input, OperationKind, OperationResult, Parameters, SignalOperation};
use crate::data::Signal;
use crate::error::OperationError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub rms: f64,
}

impl SignalStatistics {
    /// `None` for an empty slice.
    pub fn compute(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let rms = (samples.iter().map(|v| v * v).sum::<f64>() / n).sqrt();

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            min,
            max,
            mean,
            median,
            std: variance.sqrt(),
            rms,
        })
    }
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let m = mean(samples);
    (samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
}

pub struct StatsOperation;

impl SignalOperation for StatsOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Stats
    }

    fn summary(&self) -> &'static str {
        "Min, max, mean, median, standard deviation and RMS of a signal"
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
        let stats = SignalStatistics::compute(&signal.samples).ok_or_else(|| {
            OperationError::InsufficientSamples {
                operation: self.kind().to_string(),
                needed: 1,
                found: 0,
            }
        })?;

        let mut result = OperationResult::new(
            self.kind(),
            &[signal.name.as_str()],
            params,
            format!("Statistics for {}", signal.name),
            signal.samples.clone(),
        );
        result.metadata.statistics = Some(stats);
        Ok(result)
    }
}
