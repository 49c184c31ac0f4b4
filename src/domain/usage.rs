//! Per-element usage statistics and the traversal that accumulates them.
//!
//! [`UsageStats`] maps an element's local name to a [`UsageRecord`]. A
//! [`Tally`] walks a parsed document and adds each element it meets to the
//! map, consulting the [`DtdIndex`] for which children and attributes to
//! count.

use std::collections::{BTreeMap, HashMap};

use roxmltree::{Document, Node};
use serde::{Serialize, Serializer};

use crate::storage::DtdIndex;

/// Parent name recorded for a document's root element.
pub const ROOT_PARENT: &str = "";

/// How often an element held text directly, not counting descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextPresence {
    /// Occurrences with non-empty direct text.
    #[serde(rename = "has direct text")]
    pub with_text: usize,
    /// Occurrences without direct text.
    #[serde(rename = "no direct text")]
    pub without_text: usize,
}

impl TextPresence {
    /// Total occurrences counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.with_text + self.without_text
    }
}

/// Usage of one element name across the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRecord {
    /// Times the element occurred.
    pub total_count: usize,
    /// Parent local name → occurrences. The root element's parent is
    /// [`ROOT_PARENT`].
    pub parent_counts: BTreeMap<String, usize>,
    /// Legal child name → direct children with that name.
    ///
    /// Every legal child is listed once the element has been seen, with a
    /// count of zero if it never occurred.
    pub child_element_counts: BTreeMap<String, usize>,
    /// Legal attribute name → occurrences carrying it.
    pub child_attribute_counts: BTreeMap<String, usize>,
    /// Direct text presence.
    pub text_presence_counts: TextPresence,
}

impl UsageRecord {
    /// Sum of the parent counts. Always equal to `total_count`.
    #[must_use]
    pub fn parent_total(&self) -> usize {
        self.parent_counts.values().sum()
    }
}

/// Serialized as `[total, [parents, children, attributes, text]]`.
impl Serialize for UsageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            self.total_count,
            (
                &self.parent_counts,
                &self.child_element_counts,
                &self.child_attribute_counts,
                &self.text_presence_counts,
            ),
        )
            .serialize(serializer)
    }
}

/// Usage records keyed by element local name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UsageStats {
    records: BTreeMap<String, UsageRecord>,
}

impl UsageStats {
    /// The record for `name`, if the element has been seen.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UsageRecord> {
        self.records.get(name)
    }

    /// Records in element-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UsageRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Number of distinct element names seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no element has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total element occurrences across all names.
    #[must_use]
    pub fn element_total(&self) -> usize {
        self.records.values().map(|r| r.total_count).sum()
    }
}

/// Walks documents and adds what it finds to a [`UsageStats`].
#[derive(Debug, Clone, Copy)]
pub struct Tally<'d> {
    dtd: &'d DtdIndex,
    ignore_whitespace_text: bool,
}

impl<'d> Tally<'d> {
    /// A tally that checks elements against `dtd`.
    #[must_use]
    pub const fn new(dtd: &'d DtdIndex) -> Self {
        Self {
            dtd,
            ignore_whitespace_text: false,
        }
    }

    /// Treat whitespace-only text as no direct text.
    ///
    /// Off by default: any text node directly inside an element counts,
    /// including indentation between its children.
    #[must_use]
    pub const fn ignore_whitespace_text(mut self, enabled: bool) -> Self {
        self.ignore_whitespace_text = enabled;
        self
    }

    /// Counts every element of `doc`.
    pub fn count_document(&self, doc: &Document<'_>, stats: &mut UsageStats) {
        self.count_elements(doc.root_element(), stats);
    }

    /// Counts `node` and, depth first, every element below it.
    ///
    /// Nodes that are not elements (comments, processing instructions,
    /// text) are ignored.
    pub fn count_elements(&self, node: Node<'_, '_>, stats: &mut UsageStats) {
        if !node.is_element() {
            return;
        }

        let key = node.tag_name().name();
        let parent = node
            .parent_element()
            .map_or(ROOT_PARENT, |p| p.tag_name().name());

        let mut present: HashMap<&str, usize> = HashMap::new();
        for child in node.children().filter(Node::is_element) {
            *present.entry(child.tag_name().name()).or_default() += 1;
        }

        let record = stats.records.entry(key.to_owned()).or_default();
        record.total_count += 1;
        *record.parent_counts.entry(parent.to_owned()).or_default() += 1;

        for child in self.dtd.legal_children(key).iter() {
            let seen = present.get(child.as_str()).copied().unwrap_or_default();
            *record
                .child_element_counts
                .entry(child.clone())
                .or_default() += seen;
        }

        for attr in self.dtd.legal_attributes(key).iter() {
            // roxmltree reports attribute names without their prefix, so
            // `href` and `xlink:href` on one element count once.
            let seen = usize::from(node.attributes().any(|a| a.name() == attr));
            *record
                .child_attribute_counts
                .entry(attr.clone())
                .or_default() += seen;
        }

        if self.has_direct_text(node) {
            record.text_presence_counts.with_text += 1;
        } else {
            record.text_presence_counts.without_text += 1;
        }

        for child in node.children().filter(Node::is_element) {
            self.count_elements(child, stats);
        }
    }

    fn has_direct_text(&self, node: Node<'_, '_>) -> bool {
        node.children()
            .filter(Node::is_text)
            .filter_map(|n| n.text())
            .any(|text| {
                if self.ignore_whitespace_text {
                    !text.trim().is_empty()
                } else {
                    !text.is_empty()
                }
            })
    }
}
