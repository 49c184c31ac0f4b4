use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings for a reporting run.
///
/// Read from an optional TOML file. Command-line flags take precedence over
/// anything set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Location of the `dtdparse` grammar.
    ///
    /// Relative paths are resolved against the working directory. When
    /// unset, `ead.dtd.xml` is looked up next to the executable and then in
    /// the working directory.
    pub dtd: Option<PathBuf>,

    /// Whether whitespace-only text is treated as no direct text.
    ///
    /// When `false` (default) any text node inside an element counts.
    pub ignore_whitespace_text: bool,

    /// Whether a malformed corpus file aborts the run.
    ///
    /// When `false` (default) the file is reported and skipped.
    pub strict: bool,
}

/// Errors raised while loading a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}", path.display())]
    Io {
        /// Location that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid configuration.
    #[error("failed to parse config file {}", path.display())]
    Toml {
        /// Location that was read.
        path: PathBuf,
        /// Parser diagnostic.
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("ead-tag-use.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn empty_file_gives_defaults() {
        let (_tmp, path) = write_config("");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn reads_all_fields() {
        let (_tmp, path) = write_config(
            "dtd = \"grammar/ead.dtd.xml\"\nignore_whitespace_text = true\nstrict = true\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.dtd.as_deref(), Some(Path::new("grammar/ead.dtd.xml")));
        assert!(config.ignore_whitespace_text);
        assert!(config.strict);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let (_tmp, path) = write_config("colour = true\n");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("absent.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::Io { .. })));
    }
}
