//! Dataset snapshot
//!
//! A loaded measurement: one shared time axis and any number of named signals.
//! Immutable once built; every query reads from the same snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Name reserved for the time axis in source files.
pub const TIME_SIGNAL: &str = "time";

/// A named ordered sequence of samples sharing the dataset's time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub samples: Vec<f64>,
    pub unit: String,
}

impl Signal {
    pub fn new(name: impl Into<String>, samples: Vec<f64>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples,
            unit: unit.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Seconds between the first and last time stamp
    pub duration: f64,
    /// Samples per second, `len / duration` (0 for a degenerate axis)
    pub sample_rate: f64,
    pub units: BTreeMap<String, String>,
}

/// Immutable in-memory dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    time_axis: Vec<f64>,
    signals: Vec<Signal>,
    metadata: DatasetMetadata,
}

impl Dataset {
    /// Build a dataset, truncating every sequence to the shortest length.
    ///
    /// An empty time axis is replaced by sample indices. Signals named `time`
    /// are dropped (the axis is already carried separately) and units missing
    /// from `units` are inferred from the signal name.
    pub fn new(
        time_axis: Vec<f64>,
        signals: Vec<(String, Vec<f64>)>,
        units: &HashMap<String, String>,
    ) -> Self {
        let signals: Vec<(String, Vec<f64>)> = signals
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(TIME_SIGNAL))
            .collect();

        let mut time_axis = if time_axis.is_empty() {
            let n = signals.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
            (0..n).map(|i| i as f64).collect()
        } else {
            time_axis
        };

        let shortest = signals
            .iter()
            .map(|(_, s)| s.len())
            .chain(std::iter::once(time_axis.len()))
            .min()
            .unwrap_or(0);

        if time_axis.len() != shortest {
            warn!(
                "Time axis has {} samples; truncating to {}",
                time_axis.len(),
                shortest
            );
            time_axis.truncate(shortest);
        }

        let signals: Vec<Signal> = signals
            .into_iter()
            .map(|(name, mut samples)| {
                if samples.len() != shortest {
                    warn!(
                        "Signal '{}' has {} samples; truncating to {}",
                        name,
                        samples.len(),
                        shortest
                    );
                    samples.truncate(shortest);
                }
                let unit = units
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| infer_unit(&name).to_string());
                Signal::new(name, samples, unit)
            })
            .collect();

        let duration = match (time_axis.first(), time_axis.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let sample_rate = if duration > 0.0 {
            time_axis.len() as f64 / duration
        } else {
            0.0
        };

        let mut unit_table = BTreeMap::new();
        unit_table.insert(TIME_SIGNAL.to_string(), "s".to_string());
        for signal in &signals {
            unit_table.insert(signal.name.clone(), signal.unit.clone());
        }

        Self {
            time_axis,
            signals,
            metadata: DatasetMetadata {
                duration,
                sample_rate,
                units: unit_table,
            },
        }
    }

    pub fn time_axis(&self) -> &[f64] {
        &self.time_axis
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signal(name).is_some()
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn unit(&self, name: &str) -> &str {
        self.metadata
            .units
            .get(name)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Number of samples on the shared axis
    pub fn len(&self) -> usize {
        self.time_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_axis.is_empty()
    }

    /// Index of the sample closest to `t`; ties keep the first minimum.
    pub fn nearest_index(&self, t: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &x) in self.time_axis.iter().enumerate() {
            let diff = (x - t).abs();
            match best {
                Some((_, best_diff)) if diff >= best_diff => {}
                _ => best = Some((idx, diff)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Time stamp of sample `idx`, falling back to the index itself.
    pub fn time_at(&self, idx: usize) -> f64 {
        self.time_axis.get(idx).copied().unwrap_or(idx as f64)
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            signals: self.signals.iter().map(|s| s.name.clone()).collect(),
            samples: self.len(),
            duration: self.metadata.duration,
            sample_rate: self.metadata.sample_rate,
            units: self.metadata.units.clone(),
        }
    }
}

/// Serializable overview of a dataset, returned by the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub signals: Vec<String>,
    pub samples: usize,
    pub duration: f64,
    pub sample_rate: f64,
    pub units: BTreeMap<String, String>,
}

/// Best-effort unit guess from a signal name.
pub fn infer_unit(name: &str) -> &'static str {
    let n = name.to_lowercase();
    if n.contains("rpm") {
        "rpm"
    } else if n.contains("speed") {
        "km/h"
    } else if n.contains("temp") {
        "°C"
    } else if n.contains("pressure") {
        "bar"
    } else if n.contains("voltage") {
        "V"
    } else if n.contains("current") {
        "A"
    } else if n.contains("time") {
        "s"
    } else if n.contains("throttle") || n.contains("position") {
        "%"
    } else if n.contains("fuel") || n.contains("consumption") {
        "L/100km"
    } else {
        ""
    }
}

/// Cursor placed on the plot by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
}

/// Read-only snapshot of the visualization state sent along with a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    #[serde(default)]
    pub selected_signals: Vec<String>,
    #[serde(default)]
    pub primary_cursor: Option<Cursor>,
    #[serde(default)]
    pub diff_cursor: Option<Cursor>,
    #[serde(default, alias = "visibleTimeRange")]
    pub time_range: Option<[f64; 2]>,
}

impl QueryContext {
    pub fn with_primary_cursor(mut self, x: f64) -> Self {
        self.primary_cursor = Some(Cursor { x });
        self
    }

    pub fn with_diff_cursor(mut self, x: f64) -> Self {
        self.diff_cursor = Some(Cursor { x });
        self
    }

    pub fn with_selected_signals(mut self, signals: &[&str]) -> Self {
        self.selected_signals = signals.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn has_any_cursor(&self) -> bool {
        self.primary_cursor.is_some() || self.diff_cursor.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_truncates_to_shortest() {
        let ds = Dataset::new(
            vec![0.0, 0.1, 0.2, 0.3],
            vec![
                ("a".into(), vec![1.0, 2.0, 3.0]),
                ("b".into(), vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ],
            &units(),
        );
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.signal("b").unwrap().len(), 3);
    }

    #[test]
    fn test_time_signal_is_not_a_signal() {
        let ds = Dataset::new(
            vec![0.0, 1.0],
            vec![("time".into(), vec![0.0, 1.0]), ("x".into(), vec![3.0, 4.0])],
            &units(),
        );
        assert_eq!(ds.signal_names(), vec!["x"]);
        assert_eq!(ds.unit("time"), "s");
    }

    #[test]
    fn test_index_axis_when_time_missing() {
        let ds = Dataset::new(vec![], vec![("x".into(), vec![5.0, 6.0, 7.0])], &units());
        assert_eq!(ds.time_axis(), &[0.0, 1.0, 2.0]);
        assert_eq!(ds.metadata().duration, 2.0);
    }

    #[test]
    fn test_nearest_index_prefers_first_tie() {
        let ds = Dataset::new(
            vec![0.0, 1.0, 2.0],
            vec![("x".into(), vec![0.0, 0.0, 0.0])],
            &units(),
        );
        assert_eq!(ds.nearest_index(0.5), Some(0));
        assert_eq!(ds.nearest_index(1.6), Some(2));
        assert_eq!(ds.nearest_index(-4.0), Some(0));
    }

    #[test]
    fn test_unit_inference() {
        assert_eq!(infer_unit("engineRPM"), "rpm");
        assert_eq!(infer_unit("vehicleSpeed"), "km/h");
        assert_eq!(infer_unit("oilPressure"), "bar");
        assert_eq!(infer_unit("throttlePosition"), "%");
        assert_eq!(infer_unit("mystery"), "");
    }

    #[test]
    fn test_explicit_units_win() {
        let mut u = HashMap::new();
        u.insert("engineRPM".to_string(), "1/min".to_string());
        let ds = Dataset::new(vec![0.0], vec![("engineRPM".into(), vec![1.0])], &u);
        assert_eq!(ds.unit("engineRPM"), "1/min");
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let ctx: QueryContext = serde_json::from_str(
            r#"{"selectedSignals":["a"],"primaryCursor":{"x":1.5},"timeRange":[0.0,2.0]}"#,
        )
        .unwrap();
        assert_eq!(ctx.selected_signals, vec!["a"]);
        assert_eq!(ctx.primary_cursor, Some(Cursor { x: 1.5 }));
        assert!(ctx.diff_cursor.is_none());
        assert_eq!(ctx.time_range, Some([0.0, 2.0]));
    }
}
