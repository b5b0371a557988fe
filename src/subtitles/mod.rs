pub mod model;
pub mod optimizer;
pub mod parser;

pub use model::{format_seconds, format_timestamp, parse_timestamp, SubtitleRange};
pub use optimizer::SubtitleOptimizer;
pub use parser::SubtitleParser;
