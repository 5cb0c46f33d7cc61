//! Structural text extraction.
//!
//! Flattens everything a reader would see into an ordered list of text
//! blocks: section headers, the body, section footers, then floating text
//! boxes. Paragraphs, tables and cells are tracked by node identity, so a
//! merged cell reachable from several grid coordinates is emitted once while
//! two different paragraphs with the same text are both emitted.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::docx::model::{Paragraph, Table, blocks, split_blocks, text_boxes};
use crate::docx::xml::NodeId;
use crate::docx::{Document, NodeKey, PartId};

/// Where an extracted block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOrigin {
    Header,
    Body,
    Footer,
    TextBox,
}

/// One unique paragraph, cell, or text-box paragraph with visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBlock {
    pub index: usize,
    pub origin: BlockOrigin,
    pub text: String,
}

/// Extract the document's visible text, one block per line.
///
/// Returns an empty string for a document with no visible text.
pub fn extract(doc: &Document) -> String {
    extract_blocks(doc)
        .into_iter()
        .map(|b| b.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the document's visible text as ordered, deduplicated blocks.
pub fn extract_blocks(doc: &Document) -> Vec<TextBlock> {
    let mut walk = Walk {
        doc,
        seen: HashSet::new(),
        blocks: Vec::new(),
    };

    for section in doc.sections() {
        if let Some(header) = section.header {
            walk.container(header, BlockOrigin::Header);
        }
    }
    walk.container(doc.main(), BlockOrigin::Body);
    for section in doc.sections() {
        if let Some(footer) = section.footer {
            walk.container(footer, BlockOrigin::Footer);
        }
    }

    let mut box_parts = vec![doc.main()];
    box_parts.extend(doc.header_parts());
    box_parts.extend(doc.footer_parts());
    for part in box_parts {
        walk.text_boxes(part);
    }

    if walk.blocks.is_empty() {
        warn!("document has no extractable text");
    } else {
        debug!(blocks = walk.blocks.len(), "text extracted");
    }
    walk.blocks
}

struct Walk<'a> {
    doc: &'a Document,
    seen: HashSet<NodeKey>,
    blocks: Vec<TextBlock>,
}

impl Walk<'_> {
    /// First visit of `node` in `part`; false if it was already seen.
    fn visit(&mut self, part: PartId, node: NodeId) -> bool {
        self.seen.insert(NodeKey { part, node })
    }

    fn emit(&mut self, origin: BlockOrigin, text: String) {
        if text.trim().is_empty() {
            return;
        }
        self.blocks.push(TextBlock {
            index: self.blocks.len(),
            origin,
            text,
        });
    }

    /// Paragraphs, then tables, of one part's top-level blocks.
    fn container(&mut self, part: PartId, origin: BlockOrigin) {
        let (paragraphs, tables) = split_blocks(&self.doc.blocks(part));
        for p in paragraphs {
            self.paragraph(part, p, origin);
        }
        for t in tables {
            self.table(part, t, origin);
        }
    }

    fn paragraph(&mut self, part: PartId, p: Paragraph, origin: BlockOrigin) {
        if self.visit(part, p.id()) {
            let text = p.text(self.doc.tree(part));
            self.emit(origin, text);
        }
    }

    /// Row-major cells; each cell's non-blank paragraphs joined with a space.
    fn table(&mut self, part: PartId, table: Table, origin: BlockOrigin) {
        if !self.visit(part, table.id()) {
            return;
        }
        let tree = self.doc.tree(part);
        for row in table.grid(tree) {
            for cell in row {
                if !self.visit(part, cell.id()) {
                    continue;
                }
                let (paragraphs, nested) = split_blocks(&cell.blocks(tree));
                let text = paragraphs
                    .iter()
                    .map(|p| p.text(tree))
                    .filter(|t| !t.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.emit(origin, text);
                for t in nested {
                    self.table(part, t, origin);
                }
            }
        }
    }

    /// One block per paragraph inside each text box, rendering fallbacks skipped.
    fn text_boxes(&mut self, part: PartId) {
        let tree = self.doc.tree(part);
        let root = self.doc.container(part);
        for txbx in text_boxes(tree, root, true) {
            let (paragraphs, _) = split_blocks(&blocks(tree, txbx));
            for p in paragraphs {
                self.paragraph(part, p, BlockOrigin::TextBox);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::model::{MC_NS, W_NS};
    use crate::docx::package::tests::docx_bytes;

    fn p(text: &str) -> String {
        format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
    }

    fn cell(props: &str, text: &str) -> String {
        format!("<w:tc><w:tcPr>{props}</w:tcPr>{}</w:tc>", p(text))
    }

    fn doc(body: &str) -> Document {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}" xmlns:mc="{MC_NS}"><w:body>{body}</w:body></w:document>"#
        );
        Document::from_bytes(docx_bytes(&xml, &[])).expect("should open test document")
    }

    #[test]
    fn test_paragraphs_then_tables() {
        let body = format!(
            "{}<w:tbl><w:tr>{}{}</w:tr></w:tbl>{}",
            p("Jane Doe"),
            cell("", "Skills"),
            cell("", "Rust"),
            p("Summary")
        );
        assert_eq!(extract(&doc(&body)), "Jane Doe\nSummary\nSkills\nRust");
    }

    #[test]
    fn test_blank_paragraphs_skipped() {
        let body = format!("{}{}{}", p("A"), p("   "), p("B"));
        assert_eq!(extract(&doc(&body)), "A\nB");
    }

    #[test]
    fn test_identical_text_both_emitted() {
        let body = format!("{}{}", p("Python"), p("Python"));
        assert_eq!(extract(&doc(&body)), "Python\nPython");
    }

    #[test]
    fn test_merged_cells_emitted_once() {
        // Row 1: a cell spanning two columns, plus one. Row 2: a vertical
        // merge continuing the first column, plus two plain cells.
        let body = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}{}</w:tr></w:tbl>",
            cell(r#"<w:gridSpan w:val="2"/><w:vMerge w:val="restart"/>"#, "Experience"),
            cell("", "2020"),
            cell("<w:vMerge/>", ""),
            cell("", "Acme"),
            cell("", "2021"),
        );
        let blocks = extract_blocks(&doc(&body));
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, ["Experience", "2020", "Acme", "2021"]);
    }

    #[test]
    fn test_cell_paragraphs_joined_with_space() {
        let body = format!("<w:tbl><w:tr><w:tc>{}{}{}</w:tc></w:tr></w:tbl>", p("Led"), p(""), p("team"));
        assert_eq!(extract(&doc(&body)), "Led team");
    }

    #[test]
    fn test_text_boxes_last_and_fallback_skipped() {
        let shape = format!(
            "<w:p><w:r><mc:AlternateContent><mc:Choice><w:txbxContent>{}</w:txbxContent></mc:Choice><mc:Fallback><w:txbxContent>{}</w:txbxContent></mc:Fallback></mc:AlternateContent></w:r></w:p>",
            p("Contact: jane@example.com"),
            p("Contact: jane@example.com"),
        );
        let body = format!("{shape}{}", p("Body text"));
        let blocks = extract_blocks(&doc(&body));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].origin, BlockOrigin::Body);
        assert_eq!(blocks[1].origin, BlockOrigin::TextBox);
        assert_eq!(blocks[1].text, "Contact: jane@example.com");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let body = format!("{}<w:tbl><w:tr>{}</w:tr></w:tbl>", p("One"), cell("", "Two"));
        let d = doc(&body);
        assert_eq!(extract(&d), extract(&d));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(extract(&doc("")), "");
    }
}
