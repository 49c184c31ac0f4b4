use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

mod terminal;

use anyhow::Context;
use clap::{ArgAction, ValueEnum};
use ead_tag_use::{Config, Corpus, DtdIndex, Report, Scan, Tally, UsageStats, storage::dtd};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(
    version,
    about = "Analyze EAD tag usage",
    after_help = "Recursively searches \"*.xml\" files in the given directories for EAD tags."
)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// EAD XML corpus directories
    #[arg(required = true, value_name = "DIR")]
    dirs: Vec<PathBuf>,

    /// Write the tag usage report to this file instead of stdout
    #[arg(short, long = "outfile", value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// The `dtdparse` XML rendering of the EAD DTD
    ///
    /// Defaults to `ead.dtd.xml` next to the executable, then in the working
    /// directory.
    #[arg(long, value_name = "FILE")]
    dtd: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Abort on the first file that is not well-formed XML
    #[arg(long)]
    strict: bool,

    /// Treat whitespace-only text as no direct text
    #[arg(long)]
    ignore_whitespace_text: bool,

    /// Read settings from this TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Supported report formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Indented listing, one block per element
    #[default]
    Text,
    /// `{name: [total, [parents, children, attributes, text]]}`
    Json,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = self.config()?;
        let dtd_path = dtd::locate(config.dtd.as_deref());
        let dtd = DtdIndex::load(&dtd_path)
            .with_context(|| format!("cannot load the EAD DTD from {}", dtd_path.display()))?;

        let tally = Tally::new(&dtd).ignore_whitespace_text(config.ignore_whitespace_text);
        let mut stats = UsageStats::default();
        let scan = Corpus::new(&self.dirs)
            .scan(&tally, &mut stats, config.strict)
            .context("corpus scan aborted")?;
        Self::summarize(&scan);

        self.write_report(Report::new(&stats, &dtd))
    }

    /// Settings from the config file, overridden by command-line flags.
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(dtd) = &self.dtd {
            config.dtd = Some(dtd.clone());
        }
        config.strict |= self.strict;
        config.ignore_whitespace_text |= self.ignore_whitespace_text;

        tracing::debug!("Effective configuration: {config:?}");
        Ok(config)
    }

    #[instrument(skip(self, report))]
    fn write_report(&self, report: Report<'_>) -> anyhow::Result<()> {
        let mut out: Box<dyn Write> = match &self.outfile {
            Some(path) => Box::new(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("cannot create {}", path.display()))?,
            )),
            None => Box::new(io::stdout().lock()),
        };

        match self.format {
            OutputFormat::Text => {
                let color = self.outfile.is_none() && terminal::supports_color();
                report.color(color).write_text(&mut out)?;
            }
            OutputFormat::Json => report.write_json(&mut out)?,
        }

        out.flush().context("failed to write report")
    }

    fn summarize(scan: &Scan) {
        if scan.discovered() == 0 {
            tracing::warn!("No *.xml files found");
        }
        if !scan.failures.is_empty() {
            tracing::warn!(
                "{} of {} files could not be analysed:",
                scan.failures.len(),
                scan.discovered()
            );
            for failure in &scan.failures {
                tracing::warn!("  {}: {}", failure.path.display(), failure.reason);
            }
        }
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        // The report may go to stdout, so logs stay on stderr.
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}
