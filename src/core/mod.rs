pub mod config;
pub mod error;
pub mod object;
pub mod storage;
pub mod traits;
