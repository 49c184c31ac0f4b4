//! Discovery and analysis of the finding aids in a corpus.
//!
//! A [`Corpus`] is a list of root directories. Every file named `*.xml`
//! below any root is parsed and handed to a [`Tally`]. The walk is best
//! effort: unreadable directories and malformed files are logged and
//! skipped unless the scan is strict.

use std::{
    io,
    path::{Path, PathBuf},
};

use roxmltree::Document;
use tracing::instrument;
use walkdir::WalkDir;

use super::encoding::{self, DecodeError};
use crate::domain::{Tally, UsageStats};

/// Suffix a file name needs to be part of the corpus.
const XML_SUFFIX: &str = ".xml";

/// Errors raised while analysing a single corpus file.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The offending file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file's bytes do not decode in its detected encoding.
    #[error("cannot decode {}", path.display())]
    Decode {
        /// The offending file.
        path: PathBuf,
        /// Decoder diagnostic.
        #[source]
        source: DecodeError,
    },
    /// The file is not well-formed XML.
    #[error("{} is not well-formed XML", path.display())]
    Xml {
        /// The offending file.
        path: PathBuf,
        /// Parser diagnostic.
        #[source]
        source: roxmltree::Error,
    },
}

impl AnalyzeError {
    /// The file the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Decode { path, .. } | Self::Xml { path, .. } => path,
        }
    }
}

/// What happened to a file that was analysed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The document was parsed and tallied.
    Counted,
    /// The file has zero length and was skipped.
    Empty,
}

/// A file the scan skipped because it could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// The offending file.
    pub path: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

/// Summary of a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Files whose documents were tallied.
    pub counted: usize,
    /// Zero-length files that were skipped.
    pub empty: usize,
    /// Files that could not be read or parsed.
    pub failures: Vec<ScanFailure>,
}

impl Scan {
    /// Every `*.xml` file the walk found.
    #[must_use]
    pub fn discovered(&self) -> usize {
        self.counted + self.empty + self.failures.len()
    }
}

/// The directories to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    roots: Vec<PathBuf>,
}

impl Corpus {
    /// A corpus made of the given root directories.
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// The root directories, in the order given.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Every `*.xml` file below the roots.
    ///
    /// Roots are walked in order, each in file-name order. Entries that
    /// cannot be read are logged and left out.
    #[must_use]
    pub fn xml_paths(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .flat_map(|root| collect_xml_paths(root))
            .collect()
    }

    /// Analyses every file in the corpus, adding to `stats`.
    ///
    /// # Errors
    ///
    /// Only fails when `strict` is set, on the first file that cannot be
    /// read or parsed. Otherwise such files are recorded in the returned
    /// [`Scan`] and the walk carries on.
    #[instrument(skip(self, tally, stats), fields(roots = self.roots.len()))]
    pub fn scan(
        &self,
        tally: &Tally<'_>,
        stats: &mut UsageStats,
        strict: bool,
    ) -> Result<Scan, AnalyzeError> {
        let mut scan = Scan::default();

        for path in self.xml_paths() {
            match analyze_file(&path, tally, stats) {
                Ok(FileOutcome::Counted) => scan.counted += 1,
                Ok(FileOutcome::Empty) => scan.empty += 1,
                Err(e) if strict => return Err(e),
                Err(e) => {
                    let reason = error_chain(&e);
                    tracing::warn!("Skipping {}: {reason}", path.display());
                    scan.failures.push(ScanFailure { path, reason });
                }
            }
        }

        tracing::info!(
            "Scanned {} files: {} counted, {} empty, {} skipped",
            scan.discovered(),
            scan.counted,
            scan.empty,
            scan.failures.len()
        );
        Ok(scan)
    }
}

/// Parses one file and tallies its elements into `stats`.
///
/// Zero-length files are skipped without being parsed. A file that fails to
/// parse leaves `stats` untouched.
///
/// # Errors
///
/// Fails if the file cannot be read, does not decode in the encoding named
/// by its byte order mark or XML declaration, or is not well-formed XML.
pub fn analyze_file(
    path: &Path,
    tally: &Tally<'_>,
    stats: &mut UsageStats,
) -> Result<FileOutcome, AnalyzeError> {
    let io_error = |source| AnalyzeError::Io {
        path: path.to_path_buf(),
        source,
    };

    if std::fs::metadata(path).map_err(io_error)?.len() == 0 {
        tracing::debug!("Skipping empty file {}", path.display());
        return Ok(FileOutcome::Empty);
    }

    let bytes = std::fs::read(path).map_err(io_error)?;
    let text = encoding::decode(&bytes).map_err(|source| AnalyzeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let doc = Document::parse_with_options(&text, super::parsing_options()).map_err(|source| {
        AnalyzeError::Xml {
            path: path.to_path_buf(),
            source,
        }
    })?;

    tracing::debug!("Counting {}", path.display());
    tally.count_document(&doc, stats);
    Ok(FileOutcome::Counted)
}

fn collect_xml_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!("Cannot read {}: {e}", path.display());
                None
            }
        })
        .filter(|entry| is_xml_file_name(entry.file_name().to_string_lossy().as_ref()))
        .filter(|entry| entry.path().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Whether a file name matches the `*.xml` pattern.
fn is_xml_file_name(name: &str) -> bool {
    name.ends_with(XML_SUFFIX)
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::storage::{DtdIndex, SAMPLE_DTD};

    fn sample_dtd() -> DtdIndex {
        DtdIndex::from_xml(SAMPLE_DTD).expect("sample DTD should parse")
    }

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn setup_corpus() -> TempDir {
        let tmp = TempDir::new().expect("failed to create temp dir");
        write(tmp.path(), "one.xml", "<a><b/><b/><c/></a>");
        write(tmp.path(), "series/two.xml", "<a><c>Foo</c></a>");
        write(tmp.path(), "series/deeper/three.xml", "<!DOCTYPE a SYSTEM \"ead.dtd\"><a/>");
        write(tmp.path(), "notes.txt", "<a/>");
        write(tmp.path(), "series/readme.xml.bak", "<a/>");
        tmp
    }

    fn scan(corpus: &Corpus, dtd: &DtdIndex, strict: bool) -> Result<(Scan, UsageStats), AnalyzeError> {
        let mut stats = UsageStats::default();
        let scan = corpus.scan(&Tally::new(dtd), &mut stats, strict)?;
        Ok((scan, stats))
    }

    #[test_case("ead.xml", true)]
    #[test_case(".xml", true)]
    #[test_case("ead.XML", false)]
    #[test_case("ead.xml.bak", false)]
    #[test_case("xml", false)]
    fn matches_xml_glob(name: &str, expected: bool) {
        assert_eq!(is_xml_file_name(name), expected);
    }

    #[test]
    fn finds_xml_files_recursively() {
        let tmp = setup_corpus();
        let paths = Corpus::new([tmp.path()]).xml_paths();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            [
                PathBuf::from("one.xml"),
                PathBuf::from("series/deeper/three.xml"),
                PathBuf::from("series/two.xml"),
            ]
        );
    }

    #[test]
    fn tallies_every_document() {
        let tmp = setup_corpus();
        let dtd = sample_dtd();
        let (summary, stats) = scan(&Corpus::new([tmp.path()]), &dtd, false).unwrap();

        assert_eq!(summary.counted, 3);
        assert_eq!(summary.discovered(), 3);
        let a = stats.get("a").unwrap();
        assert_eq!(a.total_count, 3);
        assert_eq!(a.child_element_counts["b"], 2);
        assert_eq!(a.child_element_counts["c"], 2);
        assert_eq!(stats.get("c").unwrap().text_presence_counts.with_text, 1);
    }

    #[test]
    fn empty_files_change_nothing() {
        let tmp = setup_corpus();
        let dtd = sample_dtd();
        let corpus = Corpus::new([tmp.path()]);
        let (_, before) = scan(&corpus, &dtd, false).unwrap();

        write(tmp.path(), "series/empty.xml", "");
        let (summary, after) = scan(&corpus, &dtd, true).unwrap();

        assert_eq!(summary.empty, 1);
        assert_eq!(before, after);
    }

    #[test]
    fn malformed_files_are_skipped_and_reported() {
        let tmp = setup_corpus();
        let dtd = sample_dtd();
        let corpus = Corpus::new([tmp.path()]);
        let (_, before) = scan(&corpus, &dtd, false).unwrap();

        let broken = write(tmp.path(), "broken.xml", "<a><b></a>");
        let (summary, after) = scan(&corpus, &dtd, false).unwrap();

        assert_eq!(summary.counted, 3);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, broken);
        assert!(summary.failures[0].reason.contains("not well-formed"));
        assert_eq!(before, after);
    }

    #[test]
    fn strict_scan_stops_at_malformed_file() {
        let tmp = setup_corpus();
        let dtd = sample_dtd();
        let broken = write(tmp.path(), "broken.xml", "<a><b></a>");

        let err = scan(&Corpus::new([tmp.path()]), &dtd, true).unwrap_err();
        assert!(matches!(err, AnalyzeError::Xml { .. }));
        assert_eq!(err.path(), broken);
    }

    #[test]
    fn undeclared_non_utf8_files_are_reported() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("latin1.xml");
        fs::write(&path, b"<a>caf\xe9</a>").unwrap();

        let dtd = sample_dtd();
        let mut stats = UsageStats::default();
        let err = analyze_file(&path, &Tally::new(&dtd), &mut stats).unwrap_err();
        assert!(matches!(err, AnalyzeError::Decode { .. }));
        assert_eq!(err.path(), path);
        assert!(stats.is_empty());
    }

    #[test]
    fn declared_latin1_files_are_counted() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("latin1.xml");
        fs::write(
            &path,
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a><c>caf\xe9</c></a>",
        )
        .unwrap();

        let dtd = sample_dtd();
        let mut stats = UsageStats::default();
        let outcome = analyze_file(&path, &Tally::new(&dtd), &mut stats).unwrap();
        assert_eq!(outcome, FileOutcome::Counted);
        assert_eq!(stats.get("a").unwrap().child_element_counts["c"], 1);
        assert_eq!(stats.get("c").unwrap().text_presence_counts.with_text, 1);
    }

    #[test]
    fn utf16_files_with_bom_are_counted() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("utf16.xml");
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(
            "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a><b/><c>caf\u{e9}</c></a>"
                .encode_utf16()
                .flat_map(u16::to_le_bytes),
        );
        fs::write(&path, bytes).unwrap();

        let dtd = sample_dtd();
        let mut stats = UsageStats::default();
        let outcome = analyze_file(&path, &Tally::new(&dtd), &mut stats).unwrap();
        assert_eq!(outcome, FileOutcome::Counted);
        let a = stats.get("a").unwrap();
        assert_eq!(a.child_element_counts["b"], 1);
        assert_eq!(a.child_element_counts["c"], 1);
    }

    #[test]
    fn byte_order_mark_is_accepted() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = write(tmp.path(), "bom.xml", "\u{feff}<a/>");

        let dtd = sample_dtd();
        let mut stats = UsageStats::default();
        let outcome = analyze_file(&path, &Tally::new(&dtd), &mut stats).unwrap();
        assert_eq!(outcome, FileOutcome::Counted);
        assert_eq!(stats.get("a").unwrap().total_count, 1);
    }

    #[test]
    fn multiple_roots_accumulate() {
        let first = setup_corpus();
        let second = setup_corpus();
        let dtd = sample_dtd();
        let (summary, stats) = scan(&Corpus::new([first.path(), second.path()]), &dtd, false).unwrap();

        assert_eq!(summary.counted, 6);
        assert_eq!(stats.get("a").unwrap().total_count, 6);
    }

    #[test]
    fn missing_root_is_logged_not_fatal() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let dtd = sample_dtd();
        let (summary, stats) =
            scan(&Corpus::new([tmp.path().join("absent")]), &dtd, true).unwrap();
        assert_eq!(summary, Scan::default());
        assert!(stats.is_empty());
    }

    #[test]
    fn repeated_scans_agree() {
        let tmp = setup_corpus();
        let dtd = sample_dtd();
        let corpus = Corpus::new([tmp.path()]);
        let (_, first) = scan(&corpus, &dtd, false).unwrap();
        let (_, second) = scan(&corpus, &dtd, false).unwrap();
        assert_eq!(first, second);
    }
}
