//! Maximum, minimum and average.

use super::Answer;
use crate::data::Dataset;
use crate::ops::mean;
use crate::utils::with_unit;
use serde_json::{json, Map};

pub const NO_SIGNAL_TEXT: &str = "I'm not sure which signal you're asking about. \
Please specify a signal like RPM, speed, temperature, etc.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Max,
    Min,
    Avg,
}

impl Aggregate {
    fn label(&self) -> &'static str {
        match self {
            Aggregate::Max => "maximum",
            Aggregate::Min => "minimum",
            Aggregate::Avg => "average",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Avg => "avg",
        }
    }

    /// `None` for an empty slice.
    pub fn apply(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(match self {
            Aggregate::Max => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Min => samples.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Avg => mean(samples),
        })
    }
}

pub fn answer(kind: Aggregate, signals: &[String], dataset: &Dataset) -> Answer {
    if signals.is_empty() {
        return Answer::new(kind.category(), NO_SIGNAL_TEXT, 0.5);
    }

    let results: Vec<(&str, f64)> = signals
        .iter()
        .filter_map(|name| {
            let signal = dataset.signal(name)?;
            kind.apply(&signal.samples).map(|v| (name.as_str(), v))
        })
        .collect();

    match results.as_slice() {
        [] => Answer::new(
            kind.category(),
            "I couldn't find the signals you're asking about in the data.",
            0.5,
        ),
        [(name, value)] => Answer::new(
            kind.category(),
            format!(
                "The {} {} recorded is {}.",
                kind.label(),
                name,
                with_unit(*value, dataset.unit(name))
            ),
            0.95,
        )
        .with("signal", *name)
        .with("value", *value),
        many => {
            let text = many
                .iter()
                .map(|(name, value)| {
                    format!(
                        "The {} {} is {}",
                        kind.label(),
                        name,
                        with_unit(*value, dataset.unit(name))
                    )
                })
                .collect::<Vec<_>>()
                .join(". ");
            let values: Map<String, serde_json::Value> = many
                .iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            Answer::new(kind.category(), format!("{}.", text), 0.9).with("values", values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::scenario_dataset;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_signal_phrasing() {
        let ds = scenario_dataset();
        let a = answer(Aggregate::Min, &names(&["vehicleSpeed"]), &ds);
        assert_eq!(a.text, "The minimum vehicleSpeed recorded is 0.00 km/h.");
        assert_eq!(a.confidence, 0.95);
        assert_eq!(a.metadata["value"], json!(0.0));
    }

    #[test]
    fn test_multi_signal_phrasing() {
        let ds = scenario_dataset();
        let a = answer(Aggregate::Avg, &names(&["engineRPM", "vehicleSpeed"]), &ds);
        assert_eq!(
            a.text,
            "The average engineRPM is 1990.00 rpm. The average vehicleSpeed is 49.50 km/h."
        );
        assert_eq!(a.confidence, 0.9);
        assert_eq!(a.metadata["values"]["vehicleSpeed"], json!(49.5));
    }

    #[test]
    fn test_no_signal() {
        let ds = scenario_dataset();
        let a = answer(Aggregate::Max, &[], &ds);
        assert_eq!(a.text, NO_SIGNAL_TEXT);
        assert_eq!(a.confidence, 0.5);
    }
}
