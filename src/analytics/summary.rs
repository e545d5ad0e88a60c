//! Whole-dataset overview. Ignores any signal filtering in the query.

use super::Answer;
use crate::data::Dataset;
use crate::ops::SignalStatistics;
use crate::utils::with_unit;
use serde_json::{json, Map, Value};

pub fn answer(dataset: &Dataset) -> Answer {
    if dataset.signals().is_empty() {
        return Answer::new(
            "summary",
            "The dataset doesn't contain any signals to summarize.",
            0.5,
        );
    }

    let meta = dataset.metadata();
    let mut lines = vec![format!(
        "This dataset contains {:.1} seconds of measurement data with {} signals:",
        meta.duration,
        dataset.signals().len()
    )];
    let mut stats = Map::new();

    for signal in dataset.signals() {
        let Some(s) = SignalStatistics::compute(&signal.samples) else {
            continue;
        };
        let unit = dataset.unit(&signal.name);
        lines.push(format!(
            "- {} ranges from {:.2} to {} with an average of {}",
            signal.name,
            s.min,
            with_unit(s.max, unit),
            with_unit(s.mean, unit)
        ));
        stats.insert(
            signal.name.clone(),
            json!({"min": s.min, "max": s.max, "avg": s.mean, "std": s.std}),
        );
    }
    lines.push(format!("Sample rate: {:.1} Hz", meta.sample_rate));

    Answer::new("summary", lines.join("\n"), 0.95)
        .with("duration", meta.duration)
        .with("sampleRate", meta.sample_rate)
        .with("signalStats", Value::Object(stats))
}
