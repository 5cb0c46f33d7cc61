//! Word-processing document provider.
//!
//! Loads a `.docx` package into owned, mutable part trees, exposes the
//! structure the extractor and reconciler walk (sections, header and footer
//! parts, blocks), and saves a mutated copy as a new artifact.
//!
//! # Layout
//!
//! ```text
//! Document ─┬─ parts[0]   main part   (w:document/w:body)
//!           ├─ parts[1..] header / footer parts (w:hdr / w:ftr)
//!           └─ sections   default header + footer per w:sectPr
//! ```

pub mod model;
pub mod package;
pub mod xml;

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{TailorError, TailorResult};
use model::{Block, R_NS, W_NS, blocks};
use package::Package;
use xml::{NodeId, XmlTree};

const HEADER_REL: &str = "/header";
const FOOTER_REL: &str = "/footer";

/// Index of a part inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(usize);

/// Stable identity of a node across the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub part: PartId,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Main,
    Header,
    Footer,
}

/// A parsed XML part of the package.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub kind: PartKind,
    pub tree: XmlTree,
    dirty: bool,
}

/// Default header and footer in effect for one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Section {
    pub header: Option<PartId>,
    pub footer: Option<PartId>,
}

/// An owned, independently mutable word-processing document.
///
/// `Clone` is a full duplicate: nothing is shared between copies.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    parts: Vec<Part>,
    sections: Vec<Section>,
    body: NodeId,
}

impl Document {
    /// Load the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, not a zip package, or its
    /// main, header or footer parts are not well-formed WordprocessingML.
    pub fn open(path: &Path) -> TailorResult<Self> {
        let package = Package::open(path)?;
        let doc = Self::from_package(package).map_err(|e| match e {
            TailorError::MissingPart { .. } => TailorError::NotAWordDocument {
                path: path.to_path_buf(),
            },
            other => other,
        })?;
        info!(
            path = %path.display(),
            parts = doc.parts.len(),
            sections = doc.sections.len(),
            "document loaded"
        );
        Ok(doc)
    }

    /// Load a document from raw `.docx` bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Document::open`].
    pub fn from_bytes(bytes: Vec<u8>) -> TailorResult<Self> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    fn from_package(package: Package) -> TailorResult<Self> {
        let main_name = package.main_part_name()?;
        let main_tree = parse_part(&package, &main_name)?;
        let body = main_tree
            .child(main_tree.root(), W_NS, "body")
            .ok_or_else(|| TailorError::MissingPart {
                name: format!("{main_name}#w:body"),
            })?;

        let mut parts = vec![Part {
            name: main_name.clone(),
            kind: PartKind::Main,
            tree: main_tree,
            dirty: false,
        }];

        let targets: HashMap<String, (String, PartKind)> = package
            .relationships(&main_name)?
            .into_iter()
            .filter_map(|rel| {
                let kind = if rel.kind.ends_with(HEADER_REL) {
                    PartKind::Header
                } else if rel.kind.ends_with(FOOTER_REL) {
                    PartKind::Footer
                } else {
                    return None;
                };
                Some((rel.id, (rel.target, kind)))
            })
            .collect();

        let mut loaded: HashMap<String, PartId> = HashMap::new();
        let mut resolve = |rel_id: Option<&str>, parts: &mut Vec<Part>| -> TailorResult<Option<PartId>> {
            let Some((target, kind)) = rel_id.and_then(|id| targets.get(id)) else {
                return Ok(None);
            };
            if let Some(&id) = loaded.get(target) {
                return Ok(Some(id));
            }
            if !package.contains(target) {
                debug!(part = %target, "referenced header/footer part missing, ignoring");
                return Ok(None);
            }
            let tree = parse_part(&package, target)?;
            parts.push(Part {
                name: target.clone(),
                kind: *kind,
                tree,
                dirty: false,
            });
            let id = PartId(parts.len() - 1);
            loaded.insert(target.clone(), id);
            Ok(Some(id))
        };

        let mut sections = Vec::new();
        let mut previous = Section::default();
        for sect_pr in section_properties(&parts[0].tree, body) {
            let tree = &parts[0].tree;
            let header_ref = default_reference(tree, sect_pr, "headerReference");
            let footer_ref = default_reference(tree, sect_pr, "footerReference");
            let header = resolve(header_ref.as_deref(), &mut parts)?;
            let footer = resolve(footer_ref.as_deref(), &mut parts)?;
            // A section without its own reference continues the previous one.
            let section = Section {
                header: header.or(previous.header),
                footer: footer.or(previous.footer),
            };
            sections.push(section);
            previous = section;
        }
        if sections.is_empty() {
            sections.push(Section::default());
        }

        Ok(Self {
            package,
            parts,
            sections,
            body,
        })
    }

    pub fn main(&self) -> PartId {
        PartId(0)
    }

    /// The `w:body` element of the main part.
    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.0]
    }

    pub fn tree(&self, id: PartId) -> &XmlTree {
        &self.parts[id.0].tree
    }

    /// Mutable access to a part's tree. Call [`Document::mark_dirty`] after
    /// changing it so the part is re-serialized on save.
    pub fn tree_mut(&mut self, id: PartId) -> &mut XmlTree {
        &mut self.parts[id.0].tree
    }

    pub fn mark_dirty(&mut self, id: PartId) {
        self.parts[id.0].dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.parts.iter().any(|p| p.dirty)
    }

    /// Every part id, main part first.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        (0..self.parts.len()).map(PartId)
    }

    /// Distinct header parts in section order.
    pub fn header_parts(&self) -> Vec<PartId> {
        unique(self.sections.iter().filter_map(|s| s.header))
    }

    /// Distinct footer parts in section order.
    pub fn footer_parts(&self) -> Vec<PartId> {
        unique(self.sections.iter().filter_map(|s| s.footer))
    }

    /// The node whose children are the part's blocks.
    pub fn container(&self, id: PartId) -> NodeId {
        match self.parts[id.0].kind {
            PartKind::Main => self.body,
            PartKind::Header | PartKind::Footer => self.parts[id.0].tree.root(),
        }
    }

    pub fn blocks(&self, id: PartId) -> Vec<Block> {
        blocks(self.tree(id), self.container(id))
    }

    /// Write the document to `path` as a new package.
    ///
    /// Parts that were never marked dirty are copied byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be written.
    pub fn save(&self, path: &Path) -> TailorResult<()> {
        let replaced: HashMap<String, Vec<u8>> = self
            .parts
            .iter()
            .filter(|p| p.dirty)
            .map(|p| (p.name.clone(), p.tree.to_xml().into_bytes()))
            .collect();
        self.package.write_to(path, &replaced)?;
        info!(path = %path.display(), rewritten = replaced.len(), "document saved");
        Ok(())
    }
}

fn parse_part(package: &Package, name: &str) -> TailorResult<XmlTree> {
    let text = package.part_text(name)?;
    XmlTree::parse(&text).map_err(|source| TailorError::Xml {
        part: name.to_owned(),
        source,
    })
}

/// Every `w:sectPr` in body order: paragraph-level section breaks, then the body's own.
fn section_properties(tree: &XmlTree, body: NodeId) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = blocks(tree, body)
        .into_iter()
        .filter_map(|block| match block {
            Block::Paragraph(p) => tree
                .child(p.id(), W_NS, "pPr")
                .and_then(|ppr| tree.child(ppr, W_NS, "sectPr")),
            Block::Table(_) => None,
        })
        .collect();
    out.extend(tree.child(body, W_NS, "sectPr"));
    out
}

fn default_reference(tree: &XmlTree, sect_pr: NodeId, local: &str) -> Option<String> {
    tree.child_elements(sect_pr)
        .filter(|&r| tree.is(r, W_NS, local))
        .find(|&r| matches!(tree.attribute(r, Some(W_NS), "type"), None | Some("default")))
        .and_then(|r| tree.attribute(r, Some(R_NS), "id"))
        .map(str::to_owned)
}

fn unique(ids: impl Iterator<Item = PartId>) -> Vec<PartId> {
    let mut out: Vec<PartId> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
