pub mod parser;
pub mod stats;

pub use parser::{parse_line, parse_note};
pub use stats::TaskAggregator;
