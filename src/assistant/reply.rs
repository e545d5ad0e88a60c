//! Reply extraction
//!
//! The assistant answers in free text. Three strategies are tried in order,
//! each of which either yields a reply matching [`AssistantReply`] exactly or
//! fails as a whole.

use crate::error::QueryError;
use crate::ops::CandidateOperation;
use crate::utils::preview;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The only reply shape that is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub operations: Vec<CandidateOperation>,
    #[serde(default = "default_explanation")]
    pub explanation: String,
}

fn default_explanation() -> String {
    "I've processed your request.".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole reply is the JSON object
    Direct,
    /// JSON inside a ``` fence
    Fenced,
    /// First parseable object starting at a `{`
    BraceSubstring,
}

impl ExtractionStrategy {
    pub const ORDER: [ExtractionStrategy; 3] = [
        ExtractionStrategy::Direct,
        ExtractionStrategy::Fenced,
        ExtractionStrategy::BraceSubstring,
    ];

    fn attempt(&self, text: &str) -> Option<AssistantReply> {
        match self {
            ExtractionStrategy::Direct => serde_json::from_str(text.trim()).ok(),
            ExtractionStrategy::Fenced => {
                fenced_block(text).and_then(|body| serde_json::from_str(body.trim()).ok())
            }
            ExtractionStrategy::BraceSubstring => brace_substring(text),
        }
    }
}

/// Parse an assistant reply, reporting which strategy succeeded.
pub fn extract_reply(text: &str) -> Result<(AssistantReply, ExtractionStrategy), QueryError> {
    for strategy in ExtractionStrategy::ORDER {
        if let Some(reply) = strategy.attempt(text) {
            debug!("Assistant reply parsed via {:?}", strategy);
            return Ok((reply, strategy));
        }
    }
    Err(QueryError::MalformedAssistantReply(preview(text, 200)))
}

/// Body of the first fenced block, with an optional language tag removed.
fn fenced_block(text: &str) -> Option<&str> {
    let after = &text[text.find("```")? + 3..];
    let block = &after[..after.find("```")?];
    match block.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => Some(body),
        _ => Some(block),
    }
}

/// Stream-parse from each `{` so trailing prose after a valid object is
/// ignored, then fall back to the widest `{...}` span.
fn brace_substring(text: &str) -> Option<AssistantReply> {
    for (start, _) in text.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<AssistantReply>();
        if let Some(Ok(reply)) = stream.next() {
            return Some(reply);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
