//! Rendering of the final usage statistics.

use std::{collections::BTreeMap, io};

use owo_colors::{OwoColorize, Style};

use crate::{
    domain::{ROOT_PARENT, UsageRecord, UsageStats},
    storage::DtdIndex,
};

const NAME_WIDTH: usize = 40;
const COUNT_WIDTH: usize = 10;

/// A usage report, ready to be written out.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    stats: &'a UsageStats,
    dtd: &'a DtdIndex,
    color: bool,
}

impl<'a> Report<'a> {
    /// A report on `stats`, noting elements that `dtd` does not declare.
    #[must_use]
    pub const fn new(stats: &'a UsageStats, dtd: &'a DtdIndex) -> Self {
        Self {
            stats,
            dtd,
            color: false,
        }
    }

    /// Whether the text rendering uses terminal colours.
    #[must_use]
    pub const fn color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Writes the nested `name → [total, [parents, children, attributes,
    /// text]]` mapping as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails if the writer does.
    pub fn write_json(&self, mut out: impl io::Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut out, self.stats)?;
        writeln!(out)
    }

    /// Writes an indented, human-readable listing, one block per element.
    ///
    /// ```text
    /// did                                              12
    ///   parents
    ///     archdesc                                     12
    ///   children
    ///     unittitle                                    12
    ///     abstract                                      0
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the writer does.
    pub fn write_text(&self, mut out: impl io::Write) -> io::Result<()> {
        for (name, record) in self.stats.iter() {
            self.write_record(&mut out, name, record)?;
        }
        Ok(())
    }

    fn write_record(
        &self,
        out: &mut impl io::Write,
        name: &str,
        record: &UsageRecord,
    ) -> io::Result<()> {
        let heading = if self.dtd.declares(name) {
            self.paint(name, Style::new().bold())
        } else {
            format!(
                "{} {}",
                self.paint(name, Style::new().bold()),
                self.paint("(not in DTD)", Style::new().yellow())
            )
        };
        let pad = NAME_WIDTH.saturating_sub(visible_len(name, self.dtd.declares(name)));
        writeln!(
            out,
            "{heading}{:pad$}{:>COUNT_WIDTH$}",
            "", record.total_count
        )?;

        let parents: BTreeMap<&str, usize> = record
            .parent_counts
            .iter()
            .map(|(parent, &n)| {
                let parent = if parent == ROOT_PARENT { "(root)" } else { parent.as_str() };
                (parent, n)
            })
            .collect();
        self.write_section(out, "parents", parents.iter().map(|(k, &n)| (*k, n)))?;
        self.write_section(out, "children", counts(&record.child_element_counts))?;
        self.write_section(out, "attributes", counts(&record.child_attribute_counts))?;

        let text = record.text_presence_counts;
        self.write_section(
            out,
            "text",
            [
                ("has direct text", text.with_text),
                ("no direct text", text.without_text),
            ],
        )
    }

    fn write_section<'k>(
        &self,
        out: &mut impl io::Write,
        title: &str,
        entries: impl IntoIterator<Item = (&'k str, usize)>,
    ) -> io::Result<()> {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return Ok(());
        }

        writeln!(out, "  {title}")?;
        let width = NAME_WIDTH - 4;
        for (key, n) in entries {
            let line = format!("    {key:<width$}{n:>COUNT_WIDTH$}");
            if n == 0 {
                writeln!(out, "{}", self.paint(&line, Style::new().dimmed()))?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        Ok(())
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }
}

fn counts(map: &BTreeMap<String, usize>) -> impl Iterator<Item = (&str, usize)> {
    map.iter().map(|(k, &n)| (k.as_str(), n))
}

/// Printed width of an element heading, ignoring colour codes.
fn visible_len(name: &str, declared: bool) -> usize {
    let marker = if declared { 0 } else { " (not in DTD)".len() };
    name.chars().count() + marker
}
