//! Heuristic parameter extraction from query text.

use crate::config::contains_keyword;
use crate::data::Dataset;
use crate::ops::{FilterType, OperationKind, Parameters};
use serde_json::json;

const SEPARATORS: [char; 11] = [',', '=', ':', ';', '(', ')', '[', ']', '?', '!', '"'];

fn tokens(query: &str) -> Vec<&str> {
    query
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect()
}

fn as_number(token: &str) -> Option<f64> {
    let token = token.strip_suffix('x').unwrap_or(token);
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Every standalone number in the query, in order.
pub fn numbers(query: &str) -> Vec<f64> {
    tokens(query).into_iter().filter_map(as_number).collect()
}

/// Words that introduce a different parameter and end a number scan.
const PARAMETER_WORDS: [&str; 9] = [
    "order", "rate", "sample_rate", "samplerate", "by", "factor", "times", "cutoff", "cutoff_freq",
];

/// Up to `max` numbers following the first of `markers`, looking at most
/// four tokens ahead and stopping at the next parameter word.
pub fn numbers_after(query: &str, markers: &[&str], max: usize) -> Vec<f64> {
    let lowered = query.to_lowercase();
    let toks = tokens(&lowered);
    let Some(at) = toks.iter().position(|t| markers.contains(t)) else {
        return Vec::new();
    };
    toks[at + 1..]
        .iter()
        .take(4)
        .take_while(|t| markers.contains(*t) || !PARAMETER_WORDS.contains(*t))
        .filter_map(|t| as_number(t))
        .take(max)
        .collect()
}

pub fn number_after(query: &str, markers: &[&str]) -> Option<f64> {
    numbers_after(query, markers, 1).into_iter().next()
}

/// Filter type named (or implied) by the query.
pub fn filter_type(query: &str) -> Option<FilterType> {
    let q = query.to_lowercase();
    let named = [
        (FilterType::Bandpass, ["bandpass", "band-pass", "band pass"]),
        (FilterType::Bandstop, ["bandstop", "band-stop", "band stop"]),
        (FilterType::Highpass, ["highpass", "high-pass", "high pass"]),
        (FilterType::Lowpass, ["lowpass", "low-pass", "low pass"]),
    ];
    if let Some((kind, _)) = named
        .iter()
        .find(|(_, words)| words.iter().any(|w| contains_keyword(&q, w)))
    {
        return Some(*kind);
    }
    if contains_keyword(&q, "notch") {
        return Some(FilterType::Bandstop);
    }
    if ["smooth", "noise", "denoise"].iter().any(|w| contains_keyword(&q, w)) {
        return Some(FilterType::Lowpass);
    }
    None
}

/// `Some(2)` for "second derivative", "2nd order", "order 2".
pub fn derivative_order(query: &str) -> Option<u64> {
    let q = query.to_lowercase();
    if ["second", "2nd"].iter().any(|w| contains_keyword(&q, w)) {
        return Some(2);
    }
    if ["first", "1st"].iter().any(|w| contains_keyword(&q, w)) {
        return Some(1);
    }
    number_after(&q, &["order"]).map(|o| o as u64)
}

/// Parameters the query text spells out for `kind`. Only what is actually
/// present is filled in; fft additionally takes the dataset's sample rate.
pub fn heuristic_parameters(kind: OperationKind, query: &str, dataset: &Dataset) -> Parameters {
    let mut params = Parameters::new();
    match kind {
        OperationKind::Scale => {
            let factor = number_after(query, &["by", "factor", "times"])
                .or_else(|| numbers(query).into_iter().next());
            if let Some(f) = factor {
                params.insert("factor".into(), json!(f));
            }
        }
        OperationKind::Derivative => {
            if let Some(order) = derivative_order(query) {
                params.insert("order".into(), json!(order));
            }
        }
        OperationKind::Filter => {
            if let Some(t) = filter_type(query) {
                params.insert("filter_type".into(), json!(t.as_str()));
                let markers = ["cutoff", "cut-off", "cutoff_freq", "between"];
                let cutoffs = numbers_after(query, &markers, if t.is_band() { 2 } else { 1 });
                match cutoffs.as_slice() {
                    [] => {}
                    [single] => {
                        params.insert("cutoff_freq".into(), json!(single));
                    }
                    many => {
                        params.insert("cutoff_freq".into(), json!(many));
                    }
                }
            }
            if let Some(order) = number_after(query, &["order"]) {
                params.insert("order".into(), json!(order));
            }
        }
        OperationKind::Fft => {
            let rate = number_after(query, &["rate", "sample_rate", "samplerate"])
                .unwrap_or(dataset.metadata().sample_rate);
            if rate > 0.0 {
                params.insert("sample_rate".into(), json!(rate));
            }
        }
        _ => {}
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dataset() -> Dataset {
        Dataset::new(
            (0..10).map(|i| i as f64 * 0.1).collect(),
            vec![("engineRPM".into(), vec![0.0; 10])],
            &HashMap::new(),
        )
    }

    #[test]
    fn test_numbers() {
        assert_eq!(numbers("scale sensor1 by 2.5."), vec![2.5]);
        assert_eq!(numbers("cutoff=0.1, order 2"), vec![0.1, 2.0]);
        assert_eq!(number_after("amplify speed by 3x", &["by"]), Some(3.0));
        assert_eq!(numbers_after("bandpass between 0.05 and 0.2", &["between"], 2), vec![0.05, 0.2]);
        assert_eq!(numbers_after("cutoff 0.1 and order 4", &["cutoff"], 2), vec![0.1]);
        assert_eq!(number_after("scale speed by factor 2", &["by", "factor"]), Some(2.0));
    }

    #[test]
    fn test_filter_type() {
        assert_eq!(filter_type("smooth the rpm"), Some(FilterType::Lowpass));
        assert_eq!(filter_type("High-pass filter speed"), Some(FilterType::Highpass));
        assert_eq!(filter_type("band pass the oil pressure"), Some(FilterType::Bandpass));
        assert_eq!(filter_type("filter the rpm"), None);
    }

    #[test]
    fn test_derivative_order() {
        assert_eq!(derivative_order("second derivative of speed"), Some(2));
        assert_eq!(derivative_order("derivative of speed"), None);
        assert_eq!(derivative_order("derivative with order 2"), Some(2));
    }

    #[test]
    fn test_heuristic_parameters() {
        let ds = dataset();
        let p = heuristic_parameters(OperationKind::Scale, "scale engineRPM by 2", &ds);
        assert_eq!(p["factor"], json!(2.0));
        assert!(heuristic_parameters(OperationKind::Scale, "scale engineRPM", &ds).is_empty());

        let p = heuristic_parameters(OperationKind::Filter, "lowpass engineRPM with cutoff 0.05", &ds);
        assert_eq!(p["filter_type"], json!("lowpass"));
        assert_eq!(p["cutoff_freq"], json!(0.05));

        let p = heuristic_parameters(
            OperationKind::Filter,
            "bandpass filter engineRPM with cutoff 0.1 and order 4",
            &ds,
        );
        assert_eq!(p["cutoff_freq"], json!(0.1));
        assert_eq!(p["order"], json!(4.0));

        let p = heuristic_parameters(
            OperationKind::Filter,
            "bandpass engineRPM between 0.05 and 0.2 order 3",
            &ds,
        );
        assert_eq!(p["cutoff_freq"], json!([0.05, 0.2]));
        assert_eq!(p["order"], json!(3.0));

        let p = heuristic_parameters(OperationKind::Fft, "spectrum of engineRPM", &ds);
        assert!((p["sample_rate"].as_f64().unwrap() - 10.0 / 0.9).abs() < 1e-9);
        let p = heuristic_parameters(OperationKind::Fft, "fft of engineRPM at sample rate 50", &ds);
        assert_eq!(p["sample_rate"], json!(50.0));
    }
}
