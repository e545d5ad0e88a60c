//! Point lookups: explicit time expressions, cursor readings and
//! cursor-to-cursor comparison.

use super::Answer;
use crate::data::{Cursor, Dataset, QueryContext};
use crate::utils::{format_number, with_unit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Primary values smaller than this make a percent change meaningless.
pub const PERCENT_EPSILON: f64 = 1e-10;

const TIME_PATTERN: &str = r"(?i)\bat\s+(\d+)(\.\d+)?\s*(ms|milliseconds|seconds|sec|s)?\b";

/// "at 500ms", "at 2.5 seconds", "at 300" (milliseconds)
#[derive(Debug, Clone, PartialEq)]
pub struct TimeExpression {
    pub value: f64,
    /// Unit as written, `ms` when omitted
    pub unit: String,
    pub seconds: f64,
}

pub struct TimeParser {
    pattern: Regex,
}

impl TimeParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(TIME_PATTERN)?,
        })
    }

    pub fn parse(&self, query: &str) -> Option<TimeExpression> {
        let caps = self.pattern.captures(query)?;
        let whole = caps.get(1)?.as_str();
        let frac = caps.get(2).map_or("", |m| m.as_str());
        let value: f64 = format!("{}{}", whole, frac).parse().ok()?;
        let unit = caps
            .get(3)
            .map_or_else(|| "ms".to_string(), |m| m.as_str().to_lowercase());
        let seconds = match unit.as_str() {
            "ms" | "milliseconds" => value / 1000.0,
            _ => value,
        };
        Some(TimeExpression {
            value,
            unit,
            seconds,
        })
    }
}

fn values_at(signals: &[String], dataset: &Dataset, idx: usize) -> Vec<(String, f64)> {
    signals
        .iter()
        .filter_map(|name| {
            let v = dataset.signal(name)?.samples.get(idx).copied()?;
            Some((name.clone(), v))
        })
        .collect()
}

fn values_map(values: &[(String, f64)]) -> Map<String, Value> {
    values.iter().map(|(k, v)| (k.clone(), json!(v))).collect()
}

/// `mentioned` narrows the answer; when empty every signal is reported.
pub fn time_point(expr: &TimeExpression, mentioned: &[String], dataset: &Dataset) -> Answer {
    let requested = format!("{} {}", format_number(expr.value), expr.unit);
    let Some(idx) = dataset.nearest_index(expr.seconds) else {
        return Answer::new("time", "I couldn't find time data in the dataset.", 0.5);
    };
    let actual = dataset.time_at(idx);
    debug!("Time {}s resolved to sample {} at {}s", expr.seconds, idx, actual);

    if let [name] = mentioned {
        let Some(value) = dataset.signal(name).and_then(|s| s.samples.get(idx).copied()) else {
            return Answer::new(
                "time",
                format!("I couldn't find data for {} at time {}.", name, requested),
                0.5,
            );
        };
        return Answer::new(
            "time",
            format!(
                "At time {:.2}s (closest to your requested time of {}), the {} is {}.",
                actual,
                requested,
                name,
                with_unit(value, dataset.unit(name))
            ),
            0.95,
        )
        .with("signal", name.as_str())
        .with("value", value)
        .with("time", actual)
        .with("requestedTime", expr.seconds);
    }

    let signals: Vec<String> = if mentioned.is_empty() {
        dataset.signal_names().into_iter().map(str::to_string).collect()
    } else {
        mentioned.to_vec()
    };
    let values = values_at(&signals, dataset, idx);
    if values.is_empty() {
        return Answer::new(
            "time",
            format!("I couldn't find any signal data at time {}.", requested),
            0.5,
        );
    }

    let mut lines = vec![format!(
        "At time {:.2}s (closest to your requested time of {}):",
        actual, requested
    )];
    lines.extend(
        values
            .iter()
            .map(|(name, v)| format!("- {}: {}", name, with_unit(*v, dataset.unit(name)))),
    );
    Answer::new("time", lines.join("\n"), 0.9)
        .with("time", actual)
        .with("requestedTime", expr.seconds)
        .with("values", values_map(&values))
}

/// Pick the cursor a query refers to.
fn pick_cursor(context: &QueryContext, prefer_diff: bool) -> Option<(&'static str, Cursor)> {
    match (context.primary_cursor, context.diff_cursor) {
        (_, Some(diff)) if prefer_diff => Some(("diff", diff)),
        (Some(primary), _) => Some(("primary", primary)),
        (None, Some(diff)) => Some(("diff", diff)),
        (None, None) => None,
    }
}

pub fn cursor_values(
    context: Option<&QueryContext>,
    prefer_diff: bool,
    signals: &[String],
    dataset: &Dataset,
) -> Answer {
    let Some((which, cursor)) = context.and_then(|ctx| pick_cursor(ctx, prefer_diff)) else {
        return Answer::new(
            "cursor",
            "No cursor is active. Place a cursor on the plot and ask again.",
            0.5,
        );
    };
    let Some(idx) = dataset.nearest_index(cursor.x) else {
        return Answer::new("cursor", "The dataset has no samples to read at the cursor.", 0.5);
    };
    let actual = dataset.time_at(idx);
    let values = values_at(signals, dataset, idx);

    let mut lines = vec![format!(
        "At the {} cursor (x = {:.3}s, nearest sample at {:.3}s):",
        which, cursor.x, actual
    )];
    lines.extend(
        values
            .iter()
            .map(|(name, v)| format!("- {}: {}", name, with_unit(*v, dataset.unit(name)))),
    );

    Answer::new("cursor", lines.join("\n"), 0.95)
        .with("cursor", which)
        .with("requestedTime", cursor.x)
        .with("time", actual)
        .with("index", idx)
        .with("values", values_map(&values))
}

/// Change of one signal between the two cursors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorComparison {
    pub signal: String,
    pub primary: f64,
    pub diff: f64,
    pub delta: f64,
    /// `None` when the primary value is (nearly) zero
    pub percent_change: Option<f64>,
    /// Per second; `None` when both cursors land on the same time
    pub rate: Option<f64>,
}

impl CursorComparison {
    pub fn new(signal: &str, primary: f64, diff: f64, dt: f64) -> Self {
        let delta = diff - primary;
        Self {
            signal: signal.to_string(),
            primary,
            diff,
            delta,
            percent_change: (primary.abs() >= PERCENT_EPSILON).then(|| delta / primary * 100.0),
            rate: (dt != 0.0).then(|| delta / dt),
        }
    }

    fn line(&self, unit: &str) -> String {
        let percent = self
            .percent_change
            .map_or_else(|| "percent change n/a".to_string(), |p| format!("{:+.1}%", p));
        let rate = match self.rate {
            Some(r) if unit.is_empty() => format!("rate {:.2}/s", r),
            Some(r) => format!("rate {:.2} {}/s", r, unit),
            None => "rate n/a".to_string(),
        };
        format!(
            "- {}: {} -> {}, change {:+.2} ({}, {})",
            self.signal,
            with_unit(self.primary, unit),
            with_unit(self.diff, unit),
            self.delta,
            percent,
            rate
        )
    }
}

pub fn compare(context: Option<&QueryContext>, signals: &[String], dataset: &Dataset) -> Answer {
    let (primary, diff) = match context.map(|c| (c.primary_cursor, c.diff_cursor)) {
        Some((Some(p), Some(d))) => (p, d),
        other => {
            let mut missing = Vec::new();
            let (p, d) = other.unwrap_or((None, None));
            if p.is_none() {
                missing.push("primaryCursor");
            }
            if d.is_none() {
                missing.push("diffCursor");
            }
            return Answer::new(
                "compare",
                "Both cursors need to be active to compare values. \
Place the primary and diff cursors on the plot and ask again.",
                0.5,
            )
            .with("missing", missing);
        }
    };

    let (Some(i1), Some(i2)) = (dataset.nearest_index(primary.x), dataset.nearest_index(diff.x))
    else {
        return Answer::new("compare", "The dataset has no samples to compare.", 0.5);
    };
    let (t1, t2) = (dataset.time_at(i1), dataset.time_at(i2));
    let dt = t2 - t1;

    let comparisons: Vec<CursorComparison> = signals
        .iter()
        .filter_map(|name| {
            let s = dataset.signal(name)?;
            Some(CursorComparison::new(name, *s.samples.get(i1)?, *s.samples.get(i2)?, dt))
        })
        .collect();

    let mut lines = vec![format!(
        "Comparing the primary cursor ({:.3}s) with the diff cursor ({:.3}s), a span of {:.3}s:",
        t1, t2, dt
    )];
    lines.extend(comparisons.iter().map(|c| c.line(dataset.unit(&c.signal))));

    Answer::new("compare", lines.join("\n"), 0.95)
        .with("primaryTime", t1)
        .with("diffTime", t2)
        .with("timeDelta", dt)
        .with(
            "comparisons",
            serde_json::to_value(&comparisons).unwrap_or_default(),
        )
}
