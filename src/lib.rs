//! Signal Agency
//!
//! Natural-language analysis of multi-channel time-series data:
//! - Signal operation catalog with a fail-fast validator
//! - Staged intent resolution with clarifications instead of errors
//! - Deterministic analytics answers (extrema, correlation, anomalies, cursors)
//! - Optional language-model assistant for operation extraction

pub mod analytics;
pub mod assistant;
pub mod config;
pub mod data;
pub mod error;
pub mod ops;
pub mod resolver;
pub mod server;
pub mod utils;

// Re-exports for convenience
pub use analytics::{Answer, AnswerEngine};
pub use assistant::Assistant;
pub use config::{AssistantConfig, Vocabulary, VocabularyStore};
pub use data::{Dataset, QueryContext};
pub use error::{DatasetError, OperationError, QueryError, ValidationError};
pub use ops::{CandidateOperation, OperationCatalog, OperationKind, OperationRequest, OperationResult};
pub use resolver::{IntentResolver, ResolutionOutcome};
