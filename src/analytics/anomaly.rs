//! Three-sigma outlier detection.

use super::Answer;
use crate::data::Dataset;
use crate::ops::{mean, std_dev};
use crate::utils::with_unit;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Deviation (in population standard deviations) above which a sample is flagged.
pub const ANOMALY_THRESHOLD: f64 = 3.0;

const LISTED: usize = 5;
const REPORTED: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub signal: String,
    pub time: f64,
    pub value: f64,
    /// Signal mean
    pub expected: f64,
    /// `|value - mean| / std`
    pub deviation: f64,
}

/// Flagged samples across `signals`, most severe first.
pub fn detect_anomalies(signals: &[String], dataset: &Dataset) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    for name in signals {
        let Some(signal) = dataset.signal(name) else {
            continue;
        };
        let m = mean(&signal.samples);
        let std = std_dev(&signal.samples);
        if std == 0.0 {
            debug!("Skipping {}: zero variance", name);
            continue;
        }
        for (idx, &value) in signal.samples.iter().enumerate() {
            if (value - m).abs() > ANOMALY_THRESHOLD * std {
                anomalies.push(Anomaly {
                    signal: name.clone(),
                    time: dataset.time_at(idx),
                    value,
                    expected: m,
                    deviation: (value - m).abs() / std,
                });
            }
        }
    }
    anomalies.sort_by(|a, b| b.deviation.total_cmp(&a.deviation));
    anomalies
}

pub fn answer(signals: &[String], dataset: &Dataset) -> Answer {
    let anomalies = detect_anomalies(signals, dataset);
    if anomalies.is_empty() {
        return Answer::new(
            "anomaly",
            "I didn't detect any significant anomalies in the data.",
            0.7,
        )
        .with("anomalies", Vec::<serde_json::Value>::new());
    }

    let mut lines = vec!["I detected the following potential anomalies in the data:".to_string()];
    for (i, a) in anomalies.iter().take(LISTED).enumerate() {
        lines.push(format!(
            "{}. At time {:.2}s, {} has a value of {}, which is {:.1} standard deviations from the mean ({:.2}).",
            i + 1,
            a.time,
            a.signal,
            with_unit(a.value, dataset.unit(&a.signal)),
            a.deviation,
            a.expected
        ));
    }
    if anomalies.len() > LISTED {
        lines.push(format!("... and {} more anomalies.", anomalies.len() - LISTED));
    }

    let top: Vec<&Anomaly> = anomalies.iter().take(REPORTED).collect();
    Answer::new("anomaly", lines.join("\n"), 0.85)
        .with("anomalies", serde_json::to_value(top).unwrap_or_default())
        .with("total", anomalies.len())
}
