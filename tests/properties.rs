use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;

use signal_agency::analytics::pearson;
use signal_agency::data::Signal;
use signal_agency::ops::{BinaryOperation, Parameters, SignalOperation};
use signal_agency::{CandidateOperation, Dataset, OperationCatalog, ValidationError};

fn samples(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..max_len)
}

fn single(name: &str, data: Vec<f64>) -> Dataset {
    let time = (0..data.len()).map(|i| i as f64 * 0.01).collect();
    Dataset::new(time, vec![(name.to_string(), data)], &HashMap::new())
}

proptest! {
    #[test]
    fn binary_result_has_shorter_length(a in samples(200), b in samples(200)) {
        let (sa, sb) = (Signal::new("a", a.clone(), ""), Signal::new("b", b.clone(), ""));
        for op in [BinaryOperation::add(), BinaryOperation::subtract(), BinaryOperation::multiply(), BinaryOperation::divide()] {
            let result = op.execute(&[&sa, &sb], &Parameters::new()).unwrap();
            prop_assert_eq!(result.data.len(), a.len().min(b.len()));
        }
    }

    #[test]
    fn divide_is_always_finite(
        a in samples(100),
        b in prop::collection::vec(prop_oneof![Just(0.0f64), Just(-0.0f64), Just(1e-12), -10.0f64..10.0], 1..100),
    ) {
        let (sa, sb) = (Signal::new("a", a, ""), Signal::new("b", b, ""));
        let result = BinaryOperation::divide().execute(&[&sa, &sb], &Parameters::new()).unwrap();
        prop_assert!(result.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn second_derivative_is_repeated_first(x in prop::collection::vec(-1.0e3f64..1.0e3, 2..100)) {
        let catalog = OperationCatalog::standard();
        let ds = single("x", x);

        let first = CandidateOperation::new("derivative", &["x"]);
        let (_, once) = catalog.run(&ds, &first).unwrap();
        let (_, twice) = catalog.run(&single("x", once.data), &first).unwrap();

        let second = CandidateOperation::new("derivative", &["x"]).with_param("order", 2);
        let (_, direct) = catalog.run(&ds, &second).unwrap();

        prop_assert_eq!(direct.data, twice.data);
    }

    #[test]
    fn stats_extremes_match_samples(x in samples(300)) {
        let catalog = OperationCatalog::standard();
        let (_, result) = catalog.run(&single("x", x.clone()), &CandidateOperation::new("stats", &["x"])).unwrap();
        let stats = result.metadata.statistics.unwrap();
        prop_assert_eq!(stats.max, x.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
        prop_assert_eq!(stats.min, x.iter().cloned().fold(f64::INFINITY, f64::min));
    }

    #[test]
    fn unknown_names_are_rejected_first(name in "[a-z]{3,12}") {
        prop_assume!(signal_agency::OperationKind::parse(&name).is_none());
        let catalog = OperationCatalog::standard();
        let ds = single("x", vec![1.0, 2.0]);
        let candidate = CandidateOperation::new(name.clone(), &["missing", "signals", "too"]);
        let err = signal_agency::ops::OperationValidator::new(&catalog).validate(&candidate, &ds).unwrap_err();
        prop_assert_eq!(err, ValidationError::UnknownOperation(name));
    }

    #[test]
    fn pearson_is_bounded(a in samples(100), b in samples(100)) {
        if let Some(r) = pearson(&a, &b) {
            prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&r));
        }
    }
}

#[test]
fn derivative_order_three_is_invalid() {
    let catalog = OperationCatalog::standard();
    let ds = single("x", vec![1.0, 2.0, 4.0]);
    let candidate = CandidateOperation::new("derivative", &["x"]).with_param("order", 3);
    let err = catalog.run(&ds, &candidate).unwrap_err();
    assert_eq!(err.kind(), "invalid_parameter");
}

#[test]
fn bandpass_with_single_cutoff_uses_default_band() {
    let catalog = OperationCatalog::standard();
    let ds = single("x", (0..200).map(|i| (i as f64 * 0.2).sin()).collect());
    let candidate = CandidateOperation::new("filter", &["x"])
        .with_param("filter_type", "bandpass")
        .with_param("cutoff_freq", json!([0.2]));
    let (request, result) = catalog.run(&ds, &candidate).unwrap();
    assert_eq!(request.parameters["cutoff_freq"], json!([0.1, 0.4]));
    assert_eq!(result.data.len(), 200);
}
