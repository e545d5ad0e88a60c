//! File ingestion
//!
//! JSON exports (`{"metadata": {"units": ..}, "data": {..}}`) and plain CSV
//! tables. Binary measurement containers are recognised but not decoded.

use crate::data::dataset::{Dataset, TIME_SIGNAL};
use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Column names accepted as the time axis, compared case-insensitively.
const TIME_COLUMNS: [&str; 4] = ["time", "t", "timestamp", "timestamps"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileMetadata {
    #[serde(default)]
    units: HashMap<String, String>,
}

/// On-disk JSON layout, also produced by [`write_json`].
#[derive(Debug, Serialize, Deserialize)]
struct JsonDataset {
    #[serde(default)]
    metadata: FileMetadata,
    data: serde_json::Map<String, Value>,
}

/// Load a dataset, dispatching on the file extension.
pub fn load_file(path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let dataset = match ext.as_str() {
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        "mat" | "mf4" => {
            return Err(DatasetError::UnsupportedFormat(format!(
                ".{} files must be exported to JSON or CSV first",
                ext
            )))
        }
        other => return Err(DatasetError::UnsupportedFormat(other.to_string())),
    };

    if dataset.signals().is_empty() {
        return Err(DatasetError::Empty);
    }

    info!(
        "Loaded {} with {} signals and {} samples",
        path.display(),
        dataset.signals().len(),
        dataset.len()
    );
    Ok(dataset)
}

fn load_json(path: &Path) -> Result<Dataset, DatasetError> {
    let content = std::fs::read_to_string(path)?;
    parse_json(&content)
}

/// Parse the JSON export format. A bare `{"time": [..], "sig": [..]}` object
/// is accepted as well.
pub fn parse_json(content: &str) -> Result<Dataset, DatasetError> {
    let root: Value = serde_json::from_str(content)?;
    let parsed: JsonDataset = if root.get("data").is_some() {
        serde_json::from_value(root)?
    } else {
        match root {
            Value::Object(data) => JsonDataset {
                metadata: FileMetadata::default(),
                data,
            },
            _ => return Err(DatasetError::Malformed("expected a JSON object".into())),
        }
    };

    let mut time_axis = Vec::new();
    let mut signals = Vec::new();
    for (name, value) in parsed.data {
        let Some(samples) = numeric_array(&value) else {
            warn!("Skipping non-numeric entry '{}'", name);
            continue;
        };
        if is_time_column(&name) && time_axis.is_empty() {
            time_axis = samples;
        } else {
            signals.push((name, samples));
        }
    }

    Ok(Dataset::new(time_axis, signals, &parsed.metadata.units))
}

fn numeric_array(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
}

fn load_csv(path: &Path) -> Result<Dataset, DatasetError> {
    let reader = csv::Reader::from_path(path)?;
    read_csv(reader)
}

/// Parse CSV text with a header row.
pub fn parse_csv(content: &str) -> Result<Dataset, DatasetError> {
    read_csv(csv::Reader::from_reader(content.as_bytes()))
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Dataset, DatasetError> {
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(DatasetError::Empty);
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        for (col, field) in record.iter().enumerate().take(headers.len()) {
            let value: f64 = field.trim().parse().map_err(|_| {
                DatasetError::Malformed(format!(
                    "row {} column '{}': '{}' is not a number",
                    row_idx + 2,
                    headers[col],
                    field
                ))
            })?;
            columns[col].push(value);
        }
    }

    let mut time_axis = Vec::new();
    let mut signals = Vec::new();
    for (name, samples) in headers.into_iter().zip(columns) {
        if time_axis.is_empty() && is_time_column(&name) {
            time_axis = samples;
        } else {
            signals.push((name, samples));
        }
    }

    Ok(Dataset::new(time_axis, signals, &HashMap::new()))
}

fn is_time_column(name: &str) -> bool {
    TIME_COLUMNS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

/// Write a dataset in the JSON export format.
pub fn write_json(dataset: &Dataset, path: impl AsRef<Path>) -> Result<(), DatasetError> {
    let mut data = serde_json::Map::new();
    data.insert(
        TIME_SIGNAL.to_string(),
        serde_json::to_value(dataset.time_axis())?,
    );
    for signal in dataset.signals() {
        data.insert(signal.name.clone(), serde_json::to_value(&signal.samples)?);
    }
    let doc = JsonDataset {
        metadata: FileMetadata {
            units: dataset
                .metadata()
                .units
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        },
        data,
    };
    std::fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_with_units() {
        let ds = parse_json(
            r#"{"metadata":{"units":{"engineRPM":"1/min"}},
                "data":{"time":[0.0,0.5,1.0],"engineRPM":[800,900,1000]}}"#,
        )
        .unwrap();
        assert_eq!(ds.signal_names(), vec!["engineRPM"]);
        assert_eq!(ds.unit("engineRPM"), "1/min");
        assert_eq!(ds.metadata().duration, 1.0);
    }

    #[test]
    fn test_parse_bare_json_object() {
        let ds = parse_json(r#"{"t":[0,1],"oilPressure":[1.0,2.0],"label":"x"}"#).unwrap();
        assert_eq!(ds.signal_names(), vec!["oilPressure"]);
        assert_eq!(ds.unit("oilPressure"), "bar");
        assert_eq!(ds.time_axis(), &[0.0, 1.0]);
    }

    #[test]
    fn test_parse_csv_with_time_column() {
        let ds = parse_csv("Timestamp,vehicleSpeed\n0.0,1\n0.1,2\n0.2,3\n").unwrap();
        assert_eq!(ds.signal_names(), vec!["vehicleSpeed"]);
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_csv_rejects_text_cells() {
        let err = parse_csv("a,b\n1,2\n3,oops\n").unwrap_err();
        assert!(matches!(err, DatasetError::Malformed(_)));
    }

    #[test]
    fn test_unsupported_extensions() {
        let err = load_file("capture.mf4").unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_write_then_load() {
        let ds = parse_csv("time,a\n0,1\n1,2\n").unwrap();
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write_json(&ds, file.path()).unwrap();
        let loaded = load_file(file.path()).unwrap();
        assert_eq!(loaded.signal("a").unwrap().samples, vec![1.0, 2.0]);
    }

    #[test]
    fn test_load_empty_csv_is_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "time").unwrap();
        writeln!(file, "0").unwrap();
        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }
}
