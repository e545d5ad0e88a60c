pub mod dataset;
pub mod loader;
pub mod mock;

pub use dataset::{infer_unit, Cursor, Dataset, DatasetMetadata, DatasetSummary, QueryContext, Signal};
pub use loader::{load_file, parse_csv, parse_json, write_json};
pub use mock::MockConfig;
