//! EAD tag usage reporting
//!
//! Walks directories of Encoded Archival Description finding aids and
//! counts, per element name, how often the element occurs, under which
//! parents, which of its DTD-permitted children and attributes are used,
//! and whether it carries direct text.

pub mod domain;
pub use domain::{Config, Tally, UsageRecord, UsageStats};

/// Grammar and corpus loading.
pub mod storage;
pub use storage::{Corpus, DtdIndex, Scan};

pub mod report;
pub use report::Report;
