//! The EAD grammar, as serialized to XML by `dtdparse`.
//!
//! A `dtdparse` document has a `<dtd>` root holding one `<element>` per
//! element declaration and one `<attlist>` per attribute-list declaration:
//!
//! ```xml
//! <dtd>
//!   <element name="did">
//!     <content-model-expanded>
//!       <or-group occurrence="*">
//!         <element-name name="head"/>
//!         <element-name name="unittitle"/>
//!       </or-group>
//!     </content-model-expanded>
//!   </element>
//!   <attlist name="did">
//!     <attribute name="id"/>
//!   </attlist>
//! </dtd>
//! ```
//!
//! [`DtdIndex`] is built once per run and answers, per element name, which
//! child elements and attributes the grammar permits.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    io,
    path::{Path, PathBuf},
    rc::Rc,
};

use roxmltree::{Document, Node};

/// File name of the grammar when no explicit location is given.
pub const DEFAULT_DTD_FILE: &str = "ead.dtd.xml";

/// Errors raised while loading the grammar.
#[derive(Debug, thiserror::Error)]
pub enum DtdError {
    /// The grammar file could not be read.
    #[error("failed to read DTD from {}", path.display())]
    Io {
        /// Location that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The grammar file is not well-formed XML.
    #[error("DTD is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    /// The document parsed, but it is not a `dtdparse` grammar.
    #[error("expected a <dtd> root element, found <{0}>")]
    NotADtd(String),
}

/// Lookup table of the element and attribute-list declarations in a DTD.
///
/// Declarations are read eagerly; the permitted child and attribute sets
/// for a name are derived on first request and cached for the rest of the
/// run.
#[derive(Debug, Default)]
pub struct DtdIndex {
    /// Element name → `element-name` references in its expanded content
    /// model, in document order, duplicates included.
    content_models: HashMap<String, Vec<String>>,
    /// Element name → attribute names as declared (possibly prefixed).
    attlists: HashMap<String, Vec<String>>,
    children: RefCell<HashMap<String, Rc<[String]>>>,
    attributes: RefCell<HashMap<String, Rc<BTreeSet<String>>>>,
}

impl DtdIndex {
    /// Reads and indexes the grammar at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a `dtdparse` document.
    pub fn load(path: &Path) -> Result<Self, DtdError> {
        let text = std::fs::read_to_string(path).map_err(|source| DtdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_xml(&text)?;
        tracing::debug!(
            "Loaded DTD from {} ({} elements, {} attribute lists)",
            path.display(),
            index.content_models.len(),
            index.attlists.len()
        );
        Ok(index)
    }

    /// Indexes a grammar held in memory.
    ///
    /// # Errors
    ///
    /// Fails if `text` is not well-formed XML or its root is not `<dtd>`.
    pub fn from_xml(text: &str) -> Result<Self, DtdError> {
        let doc = Document::parse_with_options(text, super::parsing_options())?;
        let root = doc.root_element();
        if root.tag_name().name() != "dtd" {
            return Err(DtdError::NotADtd(root.tag_name().name().to_owned()));
        }

        let mut index = Self::default();
        for decl in root.children().filter(Node::is_element) {
            let Some(name) = decl.attribute("name") else {
                continue;
            };
            match decl.tag_name().name() {
                "element" => {
                    let refs = decl
                        .children()
                        .filter(|n| n.has_tag_name("content-model-expanded"))
                        .flat_map(|model| model.descendants())
                        .filter(|n| n.has_tag_name("element-name"))
                        .filter_map(|n| n.attribute("name"))
                        .map(str::to_owned);
                    index
                        .content_models
                        .entry(name.to_owned())
                        .or_default()
                        .extend(refs);
                }
                "attlist" => {
                    let attrs = decl
                        .children()
                        .filter(|n| n.has_tag_name("attribute"))
                        .filter_map(|n| n.attribute("name"))
                        .map(str::to_owned);
                    index
                        .attlists
                        .entry(name.to_owned())
                        .or_default()
                        .extend(attrs);
                }
                _ => {}
            }
        }

        Ok(index)
    }

    /// Whether the grammar declares an element called `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.content_models.contains_key(name)
    }

    /// Number of element declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content_models.len()
    }

    /// Whether the grammar declares no elements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_models.is_empty()
    }

    /// Element names permitted inside `name`, in content-model order.
    ///
    /// Each name appears once, even when the content model mentions it in
    /// several groups. Undeclared elements and elements with `EMPTY` or
    /// `#PCDATA`-only content yield an empty slice.
    pub fn legal_children(&self, name: &str) -> Rc<[String]> {
        if let Some(cached) = self.children.borrow().get(name) {
            return Rc::clone(cached);
        }

        let mut seen = BTreeSet::new();
        let children: Rc<[String]> = self
            .content_models
            .get(name)
            .into_iter()
            .flatten()
            .filter(|&child| seen.insert(child.as_str()))
            .cloned()
            .collect();

        tracing::trace!("Cached {} legal children for <{name}>", children.len());
        self.children
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&children));
        children
    }

    /// Attribute local names declared for `name`.
    ///
    /// Namespace prefixes are stripped, so `xlink:href` is reported as
    /// `href`.
    pub fn legal_attributes(&self, name: &str) -> Rc<BTreeSet<String>> {
        if let Some(cached) = self.attributes.borrow().get(name) {
            return Rc::clone(cached);
        }

        let attributes: Rc<BTreeSet<String>> = Rc::new(
            self.attlists
                .get(name)
                .into_iter()
                .flatten()
                .map(|attr| local_name(attr).to_owned())
                .collect(),
        );

        tracing::trace!("Cached {} legal attributes for <{name}>", attributes.len());
        self.attributes
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&attributes));
        attributes
    }
}

/// Strips a namespace prefix from a qualified name.
#[must_use]
pub fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

/// Picks the grammar file to load.
///
/// An explicit path always wins. Otherwise [`DEFAULT_DTD_FILE`] is looked up
/// next to the executable, then in the working directory. When neither
/// exists the working-directory path is returned so the load error names it.
#[must_use]
pub fn locate(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_DTD_FILE)));

    match beside_exe {
        Some(path) if path.is_file() => path,
        _ => PathBuf::from(DEFAULT_DTD_FILE),
    }
}

/// A small grammar in `dtdparse` form, shared by the unit tests.
#[cfg(test)]
pub(crate) const SAMPLE_DTD: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE dtd PUBLIC "-//Norman Walsh//DTD DTDParse V2.0//EN" "dtd.dtd">
<dtd version="1.0" unexpanded="1" title="sample" namecase-general="1" xml="1">
<element name="a" stagm="-" etagm="-" content-type="element">
<content-model-expanded>
  <sequence-group>
    <element-name name="b" occurrence="*"/>
    <or-group occurrence="?">
      <element-name name="c"/>
      <element-name name="b"/>
    </or-group>
  </sequence-group>
</content-model-expanded>
<content-model>
  <sequence-group>
    <parament-name name="m.a"/>
    <element-name name="ignored"/>
  </sequence-group>
</content-model>
</element>
<element name="b" content-type="empty">
<content-model-expanded><empty/></content-model-expanded>
</element>
<element name="c" content-type="mixed">
<content-model-expanded>
  <or-group occurrence="*">
    <pcdata/>
    <element-name name="emph"/>
  </or-group>
</content-model-expanded>
</element>
<element name="emph" content-type="mixed">
<content-model-expanded><pcdata/></content-model-expanded>
</element>
<attlist name="a">
  <attribute name="id" type="#IMPLIED" value="ID" default=""/>
  <attribute name="xlink:href" type="#IMPLIED" value="CDATA" default=""/>
</attlist>
<attlist name="c">
  <attribute name="level" type="#IMPLIED" value="series file item" default=""/>
</attlist>
</dtd>
"##;
