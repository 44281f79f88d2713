//! Web application firewall logs.
//!
//! JSON lines, one evaluated request per line, delivered as gzip objects.

pub mod model;
pub mod parser;

pub use model::{FirewallHttpRequest, FirewallLogEntry, HttpHeader, QueryArgs};
pub use parser::{parse_text, FirewallLogParser};
