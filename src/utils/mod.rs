//! Utils Module
pub mod format;
pub mod logging;

pub use format::{format_number, format_pair, ordinal, preview, with_unit};
pub use logging::init_logging;
