//! Application load balancer access logs.
//!
//! Space-separated, shell-quoted text with 28 positional fields per line,
//! delivered as gzip objects.

pub mod model;
pub mod parser;
pub mod tokenize;

pub use model::{LoadBalancerLogEntry, FIELD_COUNT, FIELD_NAMES, LEGACY_RESPONSE_PROCESSING_TIME};
pub use parser::{parse_text, LoadBalancerLogParser};
pub use tokenize::tokenize;
