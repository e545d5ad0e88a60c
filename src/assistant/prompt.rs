//! Prompt construction for operation extraction.

use crate::data::{Dataset, QueryContext};
use crate::ops::{OperationCatalog, SignalStatistics};
use std::fmt::Write;

/// System and user halves of one extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantPrompt {
    pub system: String,
    pub user: String,
}

const INSTRUCTIONS: &str = r#"You are an assistant for signal processing. Translate the user's request into signal operations over the dataset below.

Reply with a single JSON object and nothing else:
{
  "operations": [
    {"operation": "<name>", "signals": ["<signal>", ...], "parameters": {...}, "output_name": "<name>"}
  ],
  "explanation": "<what the operations will do>"
}

Rules:
- Use only the listed signals, spelled exactly as shown.
- Binary operations take exactly two signals, every other operation exactly one.
- Filter cutoffs are fractions of the sample rate between 0 and 0.5; bandpass and bandstop take a [low, high] pair.
- Choose output names that describe the result.
- If the request does not ask for an operation, return an empty operations list and explain why."#;

impl AssistantPrompt {
    pub fn build(
        query: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
        catalog: &OperationCatalog,
    ) -> Self {
        let mut system = String::from(INSTRUCTIONS);
        system.push_str("\n\n");
        system.push_str(&data_summary(dataset));
        system.push('\n');
        system.push_str(&catalog.prompt_section());

        let user = match context.map(context_info).filter(|c| !c.is_empty()) {
            Some(info) => format!("{}\n\n{}", query, info),
            None => query.to_string(),
        };

        Self { system, user }
    }
}

/// Per-signal ranges plus sampling facts.
pub fn data_summary(dataset: &Dataset) -> String {
    let meta = dataset.metadata();
    let mut out = format!(
        "Dataset contains {:.1} seconds of measurement data with {} signals:\n",
        meta.duration,
        dataset.signals().len()
    );
    for signal in dataset.signals() {
        let unit = dataset.unit(&signal.name);
        match SignalStatistics::compute(&signal.samples) {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "- {}: range [{:.2} to {:.2}] {}, avg={:.2} {}, std={:.2} {}",
                    signal.name, s.min, s.max, unit, s.mean, unit, s.std, unit
                );
            }
            None => {
                let _ = writeln!(out, "- {}: no samples", signal.name);
            }
        }
    }
    let _ = writeln!(out, "Sample rate: {:.1} Hz", meta.sample_rate);
    let _ = writeln!(out, "Number of samples: {}", dataset.len());
    out
}

/// Visualization state, or an empty string when nothing is set.
pub fn context_info(context: &QueryContext) -> String {
    let mut lines = Vec::new();
    if !context.selected_signals.is_empty() {
        lines.push(format!("- Selected signals: {}", context.selected_signals.join(", ")));
    }
    if let Some(c) = context.primary_cursor {
        lines.push(format!("- Primary cursor at x={:.3}s", c.x));
    }
    if let Some(c) = context.diff_cursor {
        lines.push(format!("- Diff cursor at x={:.3}s", c.x));
    }
    if let Some([start, end]) = context.time_range {
        lines.push(format!("- Current time range: {:.3}s to {:.3}s", start, end));
    }
    if lines.is_empty() {
        return String::new();
    }
    format!("Current visualization context:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dataset() -> Dataset {
        Dataset::new(
            vec![0.0, 0.5, 1.0],
            vec![("engineRPM".into(), vec![800.0, 900.0, 1000.0])],
            &HashMap::new(),
        )
    }

    #[test]
    fn test_system_lists_signals_and_operations() {
        let catalog = OperationCatalog::standard();
        let p = AssistantPrompt::build("smooth the rpm", &dataset(), None, &catalog);
        assert!(p.system.contains("- engineRPM: range [800.00 to 1000.00] rpm"));
        assert!(p.system.contains("Number of samples: 3"));
        assert!(p.system.contains("- filter:"));
        assert_eq!(p.user, "smooth the rpm");
    }

    #[test]
    fn test_context_appended_to_user_text() {
        let catalog = OperationCatalog::standard();
        let ctx = QueryContext::default()
            .with_selected_signals(&["engineRPM"])
            .with_primary_cursor(0.25);
        let p = AssistantPrompt::build("what is this", &dataset(), Some(&ctx), &catalog);
        assert_eq!(
            p.user,
            "what is this\n\nCurrent visualization context:\n- Selected signals: engineRPM\n- Primary cursor at x=0.250s"
        );

        let empty = AssistantPrompt::build("q", &dataset(), Some(&QueryContext::default()), &catalog);
        assert_eq!(empty.user, "q");
    }
}
