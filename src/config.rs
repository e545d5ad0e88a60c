//! Configuration
//!
//! [`AssistantConfig`] comes from the environment (after `.env`).
//! [`Vocabulary`] holds every keyword and alias table the resolver and the
//! answer engine consult; it is loaded once and shared read-only.

use crate::analytics::QueryCategory;
use crate::ops::OperationKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-1106-preview";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// No assistant; extraction is skipped.
    None,
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" | "off" | "" => Some(ProviderKind::None),
            "ollama" => Some(ProviderKind::Ollama),
            "openai" | "open_ai" | "openai-compatible" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout_secs: 20,
            temperature: 0.2,
        }
    }
}

impl AssistantConfig {
    /// Read `SIGNAL_AGENCY_PROVIDER`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `OPENAI_MODEL`, `OLLAMA_MODEL` and `SIGNAL_AGENCY_ASSISTANT_TIMEOUT`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());

        let provider = match lookup("SIGNAL_AGENCY_PROVIDER") {
            Some(raw) => ProviderKind::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown SIGNAL_AGENCY_PROVIDER '{}', assistant disabled", raw);
                ProviderKind::None
            }),
            None if api_key.is_some() => ProviderKind::OpenAi,
            None => ProviderKind::None,
        };

        let model = match provider {
            ProviderKind::Ollama => lookup("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.into()),
            _ => lookup("OPENAI_MODEL")
                .map(|m| strip_inline_comment(&m))
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.model),
        };

        let timeout_secs = lookup("SIGNAL_AGENCY_ASSISTANT_TIMEOUT")
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            provider,
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key,
            model,
            timeout_secs,
            temperature: defaults.temperature,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self.provider {
            ProviderKind::None => false,
            ProviderKind::Ollama => true,
            ProviderKind::OpenAi => self.api_key.is_some(),
        }
    }
}

fn strip_inline_comment(value: &str) -> String {
    value.split('#').next().unwrap_or_default().trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationKeywords {
    pub operation: OperationKind,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: QueryCategory,
    pub keywords: Vec<String>,
}

/// Natural ways of naming a signal.
///
/// `mentions` are looked for in the query; `matches` pick the dataset signal
/// whose lowercased name contains one of them, tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAlias {
    pub mentions: Vec<String>,
    pub matches: Vec<String>,
}

/// Keyword and alias tables. All entries are lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub operation_keywords: Vec<OperationKeywords>,
    pub category_keywords: Vec<CategoryKeywords>,
    pub signal_aliases: Vec<SignalAlias>,
    pub cursor_phrases: Vec<String>,
    pub diff_cursor_phrases: Vec<String>,
    pub compare_phrases: Vec<String>,
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        let op = |operation, keywords: &[&str]| OperationKeywords {
            operation,
            keywords: words(keywords),
        };
        let cat = |category, keywords: &[&str]| CategoryKeywords {
            category,
            keywords: words(keywords),
        };
        let alias = |mentions: &[&str], matches: &[&str]| SignalAlias {
            mentions: words(mentions),
            matches: words(matches),
        };

        let cursor_phrases = words(&[
            "at the cursor",
            "at cursor",
            "cursor value",
            "primary cursor",
            "cursor position",
            "diff cursor",
            "second cursor",
        ]);
        let compare_phrases = words(&[
            "compare",
            "between cursors",
            "between the cursors",
            "both cursors",
            "two cursors",
            "cursor difference",
            "delta",
            "change between",
        ]);

        Self {
            operation_keywords: vec![
                op(OperationKind::Add, &["sum", "plus", "combine", "add"]),
                op(OperationKind::Subtract, &["subtract", "minus", "difference"]),
                op(OperationKind::Multiply, &["multiply", "times", "product"]),
                op(OperationKind::Divide, &["divide", "ratio"]),
                op(OperationKind::Abs, &["absolute", "abs", "magnitude"]),
                op(OperationKind::Scale, &["scale", "amplify", "gain"]),
                op(
                    OperationKind::Derivative,
                    &["derivative", "rate of change", "differentiate", "slope", "gradient"],
                ),
                op(
                    OperationKind::Filter,
                    &[
                        "filter", "smooth", "lowpass", "low-pass", "highpass", "high-pass",
                        "bandpass", "band-pass", "bandstop", "band-stop", "noise",
                    ],
                ),
                op(OperationKind::Fft, &["fft", "fourier", "frequency", "spectrum"]),
                op(OperationKind::Stats, &["statistics", "stats"]),
            ],
            category_keywords: vec![
                cat(QueryCategory::Max, &["maximum", "max", "highest", "peak", "largest"]),
                cat(QueryCategory::Min, &["minimum", "min", "lowest", "smallest"]),
                cat(QueryCategory::Avg, &["average", "mean", "typical"]),
                cat(
                    QueryCategory::Correlation,
                    &["correlation", "relationship", "connection", "related"],
                ),
                cat(
                    QueryCategory::Anomaly,
                    &["anomaly", "anomalies", "unusual", "abnormal", "outlier"],
                ),
                cat(QueryCategory::Summary, &["summary", "overview", "describe"]),
                cat(QueryCategory::Cursor, &["cursor"]),
                cat(QueryCategory::Compare, &["compare", "delta"]),
            ],
            signal_aliases: vec![
                alias(&["engine rpm", "rpm", "revolutions"], &["rpm"]),
                alias(&["vehicle speed", "speed"], &["speed"]),
                alias(&["throttle position", "throttle"], &["throttle"]),
                alias(&["ambient temperature", "ambient"], &["ambient"]),
                alias(
                    &["engine temperature", "temperature", "temp"],
                    &["enginetemp", "temp"],
                ),
                alias(&["fuel consumption", "fuel"], &["fuel"]),
                alias(&["battery voltage", "battery", "voltage"], &["battery", "voltage"]),
                alias(&["oil pressure", "oil"], &["oil"]),
            ],
            cursor_phrases,
            diff_cursor_phrases: words(&["diff cursor", "second cursor"]),
            compare_phrases,
        }
    }
}

impl Vocabulary {
    /// Every operation whose keyword appears in the query, in dictionary order.
    pub fn operations_in(&self, query: &str) -> Vec<OperationKind> {
        let q = query.to_lowercase();
        self.operation_keywords
            .iter()
            .filter(|entry| entry.keywords.iter().any(|k| contains_keyword(&q, k)))
            .map(|entry| entry.operation)
            .collect()
    }

    /// First operation whose keyword appears in the query.
    pub fn operation_in(&self, query: &str) -> Option<OperationKind> {
        self.operations_in(query).into_iter().next()
    }

    pub fn mentions_cursor(&self, query: &str) -> bool {
        contains_any(query, &self.cursor_phrases)
    }

    pub fn mentions_diff_cursor(&self, query: &str) -> bool {
        contains_any(query, &self.diff_cursor_phrases)
    }

    pub fn mentions_comparison(&self, query: &str) -> bool {
        contains_any(query, &self.compare_phrases)
    }
}

/// Inflections a keyword may carry and still count as a hit.
const SUFFIXES: [&str; 8] = ["", "s", "es", "d", "ed", "ing", "er", "ers"];

/// Whole-word keyword search over lowercase text. "sum" matches "sums" but
/// not "summary"; "add" matches "added" but not "address".
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    find_keyword(text, keyword).is_some()
}

/// Byte offset of the first whole-word hit of `keyword`, with the same
/// suffix rules as [`contains_keyword`].
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    if keyword.is_empty() {
        return None;
    }
    text.match_indices(keyword).map(|(pos, _)| pos).find(|&pos| {
        let starts_word = text[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let rest = &text[pos + keyword.len()..];
        let tail_len = rest
            .char_indices()
            .find(|(_, c)| !c.is_alphanumeric())
            .map_or(rest.len(), |(i, _)| i);
        starts_word && SUFFIXES.contains(&&rest[..tail_len])
    })
}

fn contains_any(query: &str, phrases: &[String]) -> bool {
    let q = query.to_lowercase();
    phrases.iter().any(|p| q.contains(p.as_str()))
}

/// Loads the vocabulary from a JSON file, writing the built-in tables there
/// when the file does not exist yet.
pub struct VocabularyStore {
    path: PathBuf,
}

impl VocabularyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Arc<Vocabulary>> {
        if !self.path.exists() {
            let default = Vocabulary::default();
            self.save(&default).await?;
            info!("Wrote default vocabulary to {}", self.path.display());
            return Ok(Arc::new(default));
        }
        let content = fs::read_to_string(&self.path).await?;
        let vocabulary: Vocabulary = serde_json::from_str(&content)?;
        info!("Loaded vocabulary from {}", self.path.display());
        Ok(Arc::new(vocabulary))
    }

    pub async fn save(&self, vocabulary: &Vocabulary) -> Result<()> {
        let content = serde_json::to_string_pretty(vocabulary)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}
