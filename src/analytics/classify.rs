//! Query classification and signal extraction.

use crate::config::{contains_keyword, find_keyword, SignalAlias, Vocabulary};
use crate::data::{Dataset, QueryContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Kind of analytical question. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Max,
    Min,
    Avg,
    Correlation,
    Anomaly,
    Summary,
    Cursor,
    Compare,
    Unknown,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Max => "max",
            QueryCategory::Min => "min",
            QueryCategory::Avg => "avg",
            QueryCategory::Correlation => "correlation",
            QueryCategory::Anomaly => "anomaly",
            QueryCategory::Summary => "summary",
            QueryCategory::Cursor => "cursor",
            QueryCategory::Compare => "compare",
            QueryCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First category (in vocabulary order) with a keyword present in the query.
pub fn classify(query: &str, vocabulary: &Vocabulary) -> QueryCategory {
    let q = query.to_lowercase();
    vocabulary
        .category_keywords
        .iter()
        .find(|group| group.keywords.iter().any(|k| contains_keyword(&q, k)))
        .map(|group| group.category)
        .unwrap_or(QueryCategory::Unknown)
}

/// Signals named in the query, ordered by first mention.
///
/// Exact dataset names win over aliases. Text already claimed by a match is
/// masked so "ambient temperature" cannot also select the engine temperature.
pub fn mentioned_signals(query: &str, dataset: &Dataset, vocabulary: &Vocabulary) -> Vec<String> {
    let mut text = query.to_lowercase();
    let mut found: Vec<(usize, String)> = Vec::new();

    let mut names: Vec<&str> = dataset.signal_names();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    for name in names {
        let lower = name.to_lowercase();
        if let Some(pos) = text.find(&lower) {
            mask(&mut text, pos, lower.len());
            found.push((pos, name.to_string()));
        }
    }

    for alias in &vocabulary.signal_aliases {
        let Some((pos, len)) = first_mention(&text, alias) else {
            continue;
        };
        mask(&mut text, pos, len);
        let taken: Vec<&str> = found.iter().map(|(_, n)| n.as_str()).collect();
        if let Some(signal) = resolve_alias(alias, dataset, &taken) {
            found.push((pos, signal));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let signals: Vec<String> = found.into_iter().map(|(_, name)| name).collect();
    debug!("Signals mentioned in query: {:?}", signals);
    signals
}

/// Target signals for an analytical answer: explicit selection first, then
/// mentions, then everything.
pub fn target_signals(
    query: &str,
    dataset: &Dataset,
    context: Option<&QueryContext>,
    vocabulary: &Vocabulary,
) -> Vec<String> {
    if let Some(ctx) = context {
        let selected: Vec<String> = ctx
            .selected_signals
            .iter()
            .filter(|s| dataset.contains(s))
            .cloned()
            .collect();
        if !selected.is_empty() {
            return selected;
        }
    }

    let mentioned = mentioned_signals(query, dataset, vocabulary);
    if mentioned.is_empty() {
        dataset.signal_names().into_iter().map(str::to_string).collect()
    } else {
        mentioned
    }
}

fn first_mention(text: &str, alias: &SignalAlias) -> Option<(usize, usize)> {
    alias
        .mentions
        .iter()
        .filter_map(|m| find_keyword(text, m).map(|pos| (pos, m.len())))
        .min_by_key(|(pos, len)| (*pos, std::cmp::Reverse(*len)))
}

fn resolve_alias(alias: &SignalAlias, dataset: &Dataset, taken: &[&str]) -> Option<String> {
    alias.matches.iter().find_map(|pattern| {
        dataset
            .signal_names()
            .into_iter()
            .filter(|name| !taken.contains(name))
            .find(|name| name.to_lowercase().contains(pattern.as_str()))
            .map(str::to_string)
    })
}

/// Blank out `len` bytes at `pos`, keeping byte offsets stable.
fn mask(text: &mut String, pos: usize, len: usize) {
    let end = (pos + len).min(text.len());
    if text.is_char_boundary(pos) && text.is_char_boundary(end) {
        text.replace_range(pos..end, &" ".repeat(end - pos));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dataset() -> Dataset {
        let n = 4;
        Dataset::new(
            (0..n).map(|i| i as f64).collect(),
            ["engineRPM", "vehicleSpeed", "engineTemp", "ambientTemp", "oilPressure"]
                .iter()
                .map(|s| (s.to_string(), vec![0.0; n]))
                .collect(),
            &HashMap::new(),
        )
    }

    #[test]
    fn test_classify_first_category_wins() {
        let v = Vocabulary::default();
        assert_eq!(classify("What is the maximum engineRPM?", &v), QueryCategory::Max);
        assert_eq!(classify("lowest and highest speed", &v), QueryCategory::Max);
        assert_eq!(classify("Is rpm related to speed", &v), QueryCategory::Correlation);
        assert_eq!(classify("give me an overview", &v), QueryCategory::Summary);
        assert_eq!(classify("hello there", &v), QueryCategory::Unknown);
    }

    #[test]
    fn test_mentions_in_query_order() {
        let v = Vocabulary::default();
        let ds = dataset();
        assert_eq!(
            mentioned_signals("correlation between speed and rpm", &ds, &v),
            vec!["vehicleSpeed", "engineRPM"]
        );
    }

    #[test]
    fn test_ambient_does_not_claim_engine_temp() {
        let v = Vocabulary::default();
        let ds = dataset();
        assert_eq!(
            mentioned_signals("max ambient temperature", &ds, &v),
            vec!["ambientTemp"]
        );
        assert_eq!(
            mentioned_signals("engine temperature vs ambient temperature", &ds, &v),
            vec!["engineTemp", "ambientTemp"]
        );
        assert_eq!(mentioned_signals("average temperature", &ds, &v), vec!["engineTemp"]);
    }

    #[test]
    fn test_aliases_match_whole_words() {
        let v = Vocabulary::default();
        let ds = dataset();
        assert!(mentioned_signals("another attempt to bring it to a boil", &ds, &v).is_empty());
        assert_eq!(
            mentioned_signals("subtract oil from temps", &ds, &v),
            vec!["oilPressure", "engineTemp"]
        );
    }

    #[test]
    fn test_exact_names_and_selection() {
        let v = Vocabulary::default();
        let ds = dataset();
        assert_eq!(mentioned_signals("abs of oilPressure", &ds, &v), vec!["oilPressure"]);

        let ctx = QueryContext::default().with_selected_signals(&["vehicleSpeed", "ghost"]);
        assert_eq!(
            target_signals("max rpm", &ds, Some(&ctx), &v),
            vec!["vehicleSpeed"]
        );
        assert_eq!(target_signals("max", &ds, None, &v).len(), 5);
    }
}
