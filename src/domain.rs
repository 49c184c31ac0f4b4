//! Domain types: usage statistics and run configuration.

pub mod usage;
pub use usage::{ROOT_PARENT, Tally, TextPresence, UsageRecord, UsageStats};

mod config;
pub use config::{Config, ConfigError};
