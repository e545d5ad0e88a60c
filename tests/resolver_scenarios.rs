use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use signal_agency::assistant::LLMProvider;
use signal_agency::resolver::MissingPiece;
use signal_agency::{
    Assistant, Dataset, IntentResolver, OperationCatalog, OperationKind, QueryContext,
    ResolutionOutcome, Vocabulary,
};

/// Answers by looking at the user prompt, recording every prompt it sees.
struct SmartMockProvider {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl SmartMockProvider {
    fn new() -> Self {
        Self {
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LLMProvider for SmartMockProvider {
    async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
        let p = prompt.to_lowercase();
        debug!("MOCK PROMPT: {}", p);
        self.prompts.lock().await.push(prompt.clone());

        if p.contains("smooth the rpm") {
            return Ok(
                "Sure!\n```json\n{\"operations\": [{\"operation\": \"filter\", \"signals\": [\"engineRPM\"], \
                 \"parameters\": {\"filter_type\": \"lowpass\", \"cutoff_freq\": 0.05}, \"output_name\": \"rpmSmooth\"}], \
                 \"explanation\": \"Lowpass filtering the engine speed.\"}\n```"
                    .to_string(),
            );
        }
        if p.starts_with("add engine") {
            // arity violation on purpose
            return Ok(r#"{"operations": [{"operation": "add", "signals": ["engineRPM"]}], "explanation": "Adding."}"#.to_string());
        }
        if p.contains("spectrum") {
            return Ok(r#"{"operations": [{"operation": "fft", "signals": ["vehicleSpeed"], "parameters": null}]}"#.to_string());
        }
        if p.contains("integrate") {
            return Ok(r#"{"operations": [{"operation": "integrate", "signals": ["vehicleSpeed"]}], "explanation": "Integral."}"#.to_string());
        }
        if p.contains("tell me a joke") {
            return Ok(r#"{"operations": [], "explanation": "That is not a signal operation."}"#.to_string());
        }
        Ok("I am not sure what you mean.".to_string())
    }
}

struct DownProvider;

#[async_trait]
impl LLMProvider for DownProvider {
    async fn generate(&self, _model: &str, _prompt: String, _system: Option<String>) -> Result<String> {
        anyhow::bail!("connection refused")
    }
}

fn dataset() -> Dataset {
    let units: HashMap<String, String> = [("engineRPM", "rpm"), ("vehicleSpeed", "km/h")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Dataset::new(
        (0..100).map(|i| i as f64 / 10.0).collect(),
        vec![
            ("engineRPM".into(), (0..100).map(|i| 800.0 + 25.0 * i as f64).collect()),
            ("vehicleSpeed".into(), (0..100).map(|i| i as f64).collect()),
        ],
        &units,
    )
}

fn resolver_with(provider: Option<Arc<dyn LLMProvider>>) -> IntentResolver {
    let assistant = provider.map(|p| Assistant::new(p, "mock").with_timeout(Duration::from_secs(2)));
    IntentResolver::new(
        Arc::new(OperationCatalog::standard()),
        Arc::new(Vocabulary::default()),
        assistant,
    )
    .unwrap()
}

fn answer(outcome: &ResolutionOutcome) -> &signal_agency::Answer {
    match outcome {
        ResolutionOutcome::Answer(a) => a,
        other => panic!("expected an answer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_maximum_question_is_answered_without_assistant() {
    let mock = Arc::new(SmartMockProvider::new());
    let resolver = resolver_with(Some(mock.clone() as Arc<dyn LLMProvider>));
    let outcome = resolver.resolve("What is the maximum engineRPM?", &dataset(), None).await;

    let a = answer(&outcome);
    assert!(a.text.contains("3275.00 rpm"));
    assert_eq!(a.confidence, 0.95);
    assert!(mock.prompts.lock().await.is_empty());
}

#[tokio::test]
async fn test_add_with_one_signal_clarifies_after_assistant() {
    let resolver = resolver_with(Some(Arc::new(SmartMockProvider::new())));
    let outcome = resolver.resolve("add engineRPM", &dataset(), None).await;

    assert!(outcome.requests().is_empty());
    let clarification = outcome.clarification().unwrap();
    assert_eq!(clarification.missing, MissingPiece::SecondSignal);
    let partial = clarification.partial.as_ref().unwrap();
    assert_eq!(partial.operation, OperationKind::Add);
    assert_eq!(partial.signals, vec!["engineRPM"]);
    assert!(outcome.text().contains("engineRPM"));
    assert!(outcome.text().contains("add engineRPM and vehicleSpeed"));
}

#[tokio::test]
async fn test_add_with_one_signal_clarifies_offline() {
    let resolver = resolver_with(None);
    let outcome = resolver.resolve("add engineRPM", &dataset(), None).await;
    assert!(outcome.requests().is_empty());
    assert_eq!(outcome.clarification().unwrap().missing, MissingPiece::SecondSignal);
}

#[tokio::test]
async fn test_fenced_reply_executes() {
    let resolver = resolver_with(Some(Arc::new(SmartMockProvider::new())));
    let ds = dataset();
    let (outcome, results) = resolver.resolve_and_execute("smooth the rpm please", &ds, None).await;

    assert_eq!(outcome.text(), "Lowpass filtering the engine speed.");
    assert_eq!(outcome.requests()[0].output_name, "rpmSmooth");
    assert_eq!(outcome.requests()[0].parameters["order"], 4);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].data.len(), ds.len());
}

#[tokio::test]
async fn test_fft_takes_dataset_sample_rate() {
    let resolver = resolver_with(Some(Arc::new(SmartMockProvider::new())));
    let ds = dataset();
    let (outcome, results) = resolver.resolve_and_execute("show the spectrum of speed", &ds, None).await;

    let rate = outcome.requests()[0].parameters["sample_rate"].as_f64().unwrap();
    assert!((rate - ds.metadata().sample_rate).abs() < 1e-9);
    assert_eq!(outcome.text(), "I've processed your request.");
    assert!(results[0].metadata.frequency_axis.is_some());
}

#[tokio::test]
async fn test_unknown_operation_asks_which_operation() {
    let resolver = resolver_with(Some(Arc::new(SmartMockProvider::new())));
    let outcome = resolver.resolve("integrate vehicleSpeed", &dataset(), None).await;

    let clarification = outcome.clarification().unwrap();
    assert_eq!(clarification.missing, MissingPiece::Operation);
    assert!(outcome.text().contains("vehicleSpeed"));
}

#[tokio::test]
async fn test_empty_operation_list_is_definitive() {
    let resolver = resolver_with(Some(Arc::new(SmartMockProvider::new())));
    let outcome = resolver.resolve("tell me a joke about engineRPM", &dataset(), None).await;
    match outcome {
        ResolutionOutcome::Operations {
            operations,
            explanation,
            clarification,
        } => {
            assert!(operations.is_empty());
            assert!(clarification.is_none());
            assert_eq!(explanation, "That is not a signal operation.");
        }
        other => panic!("expected operations, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_or_rambling_assistant_falls_back_to_keywords() {
    let ds = dataset();
    for provider in [
        Arc::new(DownProvider) as Arc<dyn LLMProvider>,
        Arc::new(SmartMockProvider::new()),
    ] {
        let resolver = resolver_with(Some(provider));
        let (outcome, results) = resolver
            .resolve_and_execute("combine engineRPM and vehicleSpeed", &ds, None)
            .await;
        assert_eq!(outcome.requests()[0].operation, OperationKind::Add);
        assert_eq!(results[0].data[2], 850.0 + 2.0);
        assert_eq!(results[0].description(), "Sum of engineRPM and vehicleSpeed");
    }
}

#[tokio::test]
async fn test_context_reaches_the_assistant() {
    let mock = Arc::new(SmartMockProvider::new());
    let resolver = resolver_with(Some(mock.clone() as Arc<dyn LLMProvider>));
    let ctx = QueryContext::default().with_selected_signals(&["vehicleSpeed"]);
    let _ = resolver.resolve("smooth the rpm", &dataset(), Some(&ctx)).await;

    let prompts = mock.prompts.lock().await;
    assert!(prompts[0].contains("- Selected signals: vehicleSpeed"));
}

#[tokio::test]
async fn test_identical_signals_correlate_strongly() {
    let samples: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin()).collect();
    let ds = Dataset::new(
        (0..50).map(|i| i as f64 * 0.1).collect(),
        vec![("engineRPM".into(), samples.clone()), ("engineRPMCopy".into(), samples)],
        &HashMap::new(),
    );
    let outcome = resolver_with(None)
        .resolve("Is there a correlation between engineRPM and engineRPMCopy?", &ds, None)
        .await;
    let a = answer(&outcome);
    assert!(a.text.contains("strong positive"));
    assert!((a.metadata["correlation"].as_f64().unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_anomalies() {
    let outcome = resolver_with(None)
        .resolve("Are there any anomalies in vehicleSpeed?", &dataset(), None)
        .await;
    let a = answer(&outcome);
    assert_eq!(a.confidence, 0.7);
    assert_eq!(a.metadata["anomalies"], serde_json::json!([]));
}

#[tokio::test]
async fn test_compare_needs_both_cursors() {
    let ctx = QueryContext::default().with_primary_cursor(2.0);
    let outcome = resolver_with(None)
        .resolve("compare the values between the cursors", &dataset(), Some(&ctx))
        .await;
    let a = answer(&outcome);
    assert!(a.text.starts_with("Both cursors need to be active"));
    assert_eq!(a.metadata["missing"], serde_json::json!(["diffCursor"]));
}

#[tokio::test]
async fn test_compare_with_both_cursors() {
    let ctx = QueryContext::default()
        .with_primary_cursor(2.0)
        .with_diff_cursor(4.0)
        .with_selected_signals(&["vehicleSpeed"]);
    let outcome = resolver_with(None)
        .resolve("compare the cursors", &dataset(), Some(&ctx))
        .await;
    let a = answer(&outcome);
    assert_eq!(a.confidence, 0.95);
    let comparison = &a.metadata["comparisons"][0];
    assert_eq!(comparison["signal"], "vehicleSpeed");
    assert!((comparison["delta"].as_f64().unwrap() - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_timestamp_query() {
    let outcome = resolver_with(None)
        .resolve("What was the vehicleSpeed at 2.5 seconds?", &dataset(), None)
        .await;
    let a = answer(&outcome);
    assert!(a.text.contains("the vehicleSpeed is 25.00 km/h"));
}

#[tokio::test]
async fn test_nothing_recognized_gives_help() {
    let outcome = resolver_with(None).resolve("hmm", &dataset(), None).await;
    let a = answer(&outcome);
    assert!(a.text.contains("engineRPM, vehicleSpeed"));
    assert_eq!(a.metadata["error"], "ambiguous_query");
}

#[tokio::test]
async fn test_bandpass_with_single_cutoff_and_order_executes() {
    let ds = dataset();
    let (outcome, results) = resolver_with(None)
        .resolve_and_execute("bandpass filter engineRPM with cutoff 0.1 and order 4", &ds, None)
        .await;

    assert!(outcome.clarification().is_none());
    let request = &outcome.requests()[0];
    assert_eq!(request.operation, OperationKind::Filter);
    assert_eq!(request.parameters["cutoff_freq"], serde_json::json!([0.1, 0.4]));
    assert_eq!(request.parameters["order"], 4);
    assert_eq!(results[0].data.len(), ds.len());
}
