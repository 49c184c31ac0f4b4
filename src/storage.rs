//! Reading the grammar and the corpus from disk.

pub mod corpus;
pub mod dtd;
pub mod encoding;

pub use corpus::{AnalyzeError, Corpus, FileOutcome, Scan, ScanFailure};
#[cfg(test)]
pub(crate) use dtd::SAMPLE_DTD;
pub use dtd::{DtdError, DtdIndex};
pub use encoding::DecodeError;

/// Parser settings shared by the grammar and corpus documents.
///
/// Finding aids usually carry a `DOCTYPE`, which `roxmltree` rejects unless
/// told otherwise.
#[must_use]
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}
