//! Awslog library crate.
//!
//! Parses application load balancer access logs and web application firewall
//! logs from gzip objects into typed records, and writes them back out as JSON
//! lines or Parquet.

pub mod core;
pub mod formats;
pub mod sources;

pub use crate::core::config;
pub use crate::core::error::{Error, LineFault, Result};
pub use crate::core::storage::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use crate::core::traits::{LogParser, RecordWriter};
pub use crate::sources::alb::{LoadBalancerLogEntry, LoadBalancerLogParser};
pub use crate::sources::waf::{FirewallHttpRequest, FirewallLogEntry, FirewallLogParser};
