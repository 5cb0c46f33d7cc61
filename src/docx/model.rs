//! Typed views over WordprocessingML nodes.
//!
//! Paragraphs, runs, tables and cells are thin `Copy` handles around a
//! [`NodeId`]; every accessor takes the owning [`XmlTree`] explicitly, so the
//! same handle stays valid while the tree is mutated through `&mut`.

use std::ops::Range;

use serde::Serialize;

use super::xml::{NodeId, XML_NS, XmlTree};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// Inline containers whose runs still belong to the paragraph's visible text.
const INLINE_WRAPPERS: &[&str] = &[
    "hyperlink",
    "ins",
    "moveTo",
    "smartTag",
    "customXml",
    "fldSimple",
    "sdt",
    "sdtContent",
];

/// Block-level containers that hold paragraphs and tables transparently.
const BLOCK_WRAPPERS: &[&str] = &["sdt", "sdtContent", "customXml"];

/// Run children that are not text and must survive a text rewrite.
const OBJECT_CHILDREN: &[&str] = &["drawing", "pict", "object", "AlternateContent"];

/// Schema order of the `w:rPr` children this crate writes or must skip past.
const RPR_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect",
    "bdr", "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout",
    "specVanish", "oMath",
];

fn is_w(tree: &XmlTree, id: NodeId, names: &[&str]) -> bool {
    tree.namespace(id) == Some(W_NS) && tree.local_name(id).is_some_and(|n| names.contains(&n))
}

/// Child element of a block container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Paragraphs and tables directly under `container`, looking through content controls.
pub fn blocks(tree: &XmlTree, container: NodeId) -> Vec<Block> {
    let mut out = Vec::new();
    collect_blocks(tree, container, &mut out);
    out
}

fn collect_blocks(tree: &XmlTree, container: NodeId, out: &mut Vec<Block>) {
    for child in tree.child_elements(container) {
        if tree.is(child, W_NS, "p") {
            out.push(Block::Paragraph(Paragraph(child)));
        } else if tree.is(child, W_NS, "tbl") {
            out.push(Block::Table(Table(child)));
        } else if is_w(tree, child, BLOCK_WRAPPERS) {
            collect_blocks(tree, child, out);
        }
    }
}

/// Split blocks into paragraphs-then-tables, the order readers expect per region.
pub fn split_blocks(blocks: &[Block]) -> (Vec<Paragraph>, Vec<Table>) {
    let mut paragraphs = Vec::new();
    let mut tables = Vec::new();
    for block in blocks {
        match *block {
            Block::Paragraph(p) => paragraphs.push(p),
            Block::Table(t) => tables.push(t),
        }
    }
    (paragraphs, tables)
}

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Paragraph(pub NodeId);

impl Paragraph {
    pub fn id(self) -> NodeId {
        self.0
    }

    /// Runs in reading order, including those nested in hyperlinks and other inline wrappers.
    pub fn runs(self, tree: &XmlTree) -> Vec<Run> {
        let mut out = Vec::new();
        collect_runs(tree, self.0, &mut out);
        out
    }

    /// Visible text: the concatenation of every run's text.
    pub fn text(self, tree: &XmlTree) -> String {
        self.runs(tree).into_iter().map(|r| r.text(tree)).collect()
    }

    /// The direct child of this paragraph that contains `node`.
    pub fn top_level_child(self, tree: &XmlTree, node: NodeId) -> Option<NodeId> {
        let mut cursor = node;
        loop {
            let parent = tree.parent(cursor)?;
            if parent == self.0 {
                return Some(cursor);
            }
            cursor = parent;
        }
    }

    /// Detach inline wrappers that no longer hold any run.
    pub fn prune_empty_wrappers(self, tree: &mut XmlTree) {
        let empty: Vec<NodeId> = tree
            .child_elements(self.0)
            .filter(|&c| is_w(tree, c, INLINE_WRAPPERS))
            .filter(|&c| {
                !tree
                    .descendants(c)
                    .into_iter()
                    .any(|d| tree.is(d, W_NS, "r"))
            })
            .collect();
        for wrapper in empty {
            tree.detach(wrapper);
        }
    }
}

fn collect_runs(tree: &XmlTree, parent: NodeId, out: &mut Vec<Run>) {
    for child in tree.child_elements(parent) {
        if tree.is(child, W_NS, "r") {
            out.push(Run(child));
        } else if is_w(tree, child, INLINE_WRAPPERS) {
            collect_runs(tree, child, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Run(pub NodeId);

impl Run {
    pub fn id(self) -> NodeId {
        self.0
    }

    /// Text of the run: `w:t` content plus tabs, line breaks and hyphens.
    pub fn text(self, tree: &XmlTree) -> String {
        tree.child_elements(self.0)
            .filter_map(|child| child_text(tree, child))
            .collect()
    }

    /// Replace the run's text, keeping `w:rPr` and any object children in place.
    ///
    /// Tabs become `w:tab` and line breaks `w:br`, the inverse of [`Run::text`].
    pub fn set_text(self, tree: &mut XmlTree, text: &str) {
        let children: Vec<NodeId> = tree.children(self.0).to_vec();
        let mut insert_at = None;
        let mut kept = 0;
        for child in children {
            if is_text_child(tree, child) {
                insert_at.get_or_insert(kept);
                tree.detach(child);
            } else {
                kept += 1;
            }
        }
        // Text goes where the old text was, or after everything else.
        let mut at = insert_at.unwrap_or(kept);
        for node in text_nodes(tree, text) {
            tree.insert_child(self.0, at, node);
            at += 1;
        }
    }

    /// Replace byte range `span` of [`Run::text`] with `text`.
    ///
    /// Only the text children the range touches are rewritten; tabs, breaks
    /// and non-breaking hyphens outside it keep their original elements.
    pub fn replace_span(self, tree: &mut XmlTree, span: Range<usize>, text: &str) {
        let mut offset = 0;
        let mut touched: Vec<(NodeId, Range<usize>)> = Vec::new();
        for child in tree.child_elements(self.0).collect::<Vec<_>>() {
            let Some(value) = child_text(tree, child) else {
                continue;
            };
            let range = offset..offset + value.len();
            offset = range.end;
            if range.start < span.end && range.end > span.start {
                touched.push((child, range));
            }
        }

        let (Some((first, first_range)), Some((last, last_range))) =
            (touched.first().cloned(), touched.last().cloned())
        else {
            return;
        };

        // Special elements are one byte wide, so only `w:t` can be cut.
        let head = if tree.is(first, W_NS, "t") && span.start > first_range.start {
            tree.text_content(first)[..span.start - first_range.start].to_owned()
        } else {
            String::new()
        };
        let tail = if tree.is(last, W_NS, "t") && span.end < last_range.end {
            tree.text_content(last)[span.end - last_range.start..].to_owned()
        } else {
            String::new()
        };

        let Some(at) = tree.index_of(self.0, first) else {
            return;
        };
        for (node, _) in &touched {
            tree.detach(*node);
        }
        for (i, node) in text_nodes(tree, &format!("{head}{text}{tail}")).into_iter().enumerate() {
            tree.insert_child(self.0, at + i, node);
        }
    }

    /// True if the run carries drawings, pictures or embedded objects.
    pub fn has_objects(self, tree: &XmlTree) -> bool {
        tree.child_elements(self.0).any(|c| {
            tree.local_name(c)
                .is_some_and(|name| OBJECT_CHILDREN.contains(&name))
        })
    }

    pub fn properties(self, tree: &XmlTree) -> Option<NodeId> {
        tree.child(self.0, W_NS, "rPr")
    }

    pub fn style(self, tree: &XmlTree) -> RunStyle {
        self.properties(tree)
            .map(|rpr| RunStyle::read(tree, rpr))
            .unwrap_or_default()
    }

    /// Write every field of `style` that is set; unset fields are left alone.
    pub fn set_style(self, tree: &mut XmlTree, style: &RunStyle) {
        let rpr = match self.properties(tree) {
            Some(rpr) => rpr,
            None => {
                let rpr = tree.create_element(W_NS, "rPr");
                tree.insert_child(self.0, 0, rpr);
                rpr
            }
        };

        if let Some(name) = &style.font_name {
            let fonts = ensure_rpr_child(tree, rpr, "rFonts");
            tree.set_attribute(fonts, Some(W_NS), "ascii", name);
            tree.set_attribute(fonts, Some(W_NS), "hAnsi", name);
        }
        if let Some(bold) = style.bold {
            set_toggle(tree, rpr, "b", bold);
        }
        if let Some(italic) = style.italic {
            set_toggle(tree, rpr, "i", italic);
        }
        if let Some(size) = style.font_size {
            let sz = ensure_rpr_child(tree, rpr, "sz");
            let half_points = format!("{}", (size * 2.0).round());
            tree.set_attribute(sz, Some(W_NS), "val", &half_points);
        }
    }
}

/// What a run child contributes to [`Run::text`]; `None` for non-text children.
fn child_text(tree: &XmlTree, child: NodeId) -> Option<String> {
    if tree.namespace(child) != Some(W_NS) {
        return None;
    }
    match tree.local_name(child)? {
        "t" => Some(tree.text_content(child)),
        "tab" | "ptab" => Some("\t".to_owned()),
        "cr" => Some("\n".to_owned()),
        "br" if is_line_break(tree, child) => Some("\n".to_owned()),
        "noBreakHyphen" => Some("-".to_owned()),
        _ => None,
    }
}

fn is_line_break(tree: &XmlTree, br: NodeId) -> bool {
    matches!(tree.attribute(br, Some(W_NS), "type"), None | Some("textWrapping"))
}

fn is_text_child(tree: &XmlTree, id: NodeId) -> bool {
    if tree.namespace(id) != Some(W_NS) {
        return false;
    }
    match tree.local_name(id) {
        Some("t" | "tab" | "ptab" | "cr" | "noBreakHyphen") => true,
        Some("br") => is_line_break(tree, id),
        _ => false,
    }
}

fn text_nodes(tree: &mut XmlTree, text: &str) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    let mut pending = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\t' => {
                flush_text(tree, &mut pending, &mut nodes);
                nodes.push(tree.create_element(W_NS, "tab"));
            }
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    continue;
                }
                flush_text(tree, &mut pending, &mut nodes);
                nodes.push(tree.create_element(W_NS, "br"));
            }
            _ => pending.push(ch),
        }
    }
    flush_text(tree, &mut pending, &mut nodes);
    nodes
}

fn flush_text(tree: &mut XmlTree, pending: &mut String, nodes: &mut Vec<NodeId>) {
    if pending.is_empty() {
        return;
    }
    let t = tree.create_element(W_NS, "t");
    tree.set_attribute(t, Some(XML_NS), "space", "preserve");
    let content = tree.create_text(pending);
    tree.append_child(t, content);
    nodes.push(t);
    pending.clear();
}

fn ensure_rpr_child(tree: &mut XmlTree, rpr: NodeId, local: &str) -> NodeId {
    if let Some(existing) = tree.child(rpr, W_NS, local) {
        return existing;
    }
    let rank = |name: &str| RPR_ORDER.iter().position(|&n| n == name).unwrap_or(usize::MAX);
    let new_rank = rank(local);
    let index = tree
        .children(rpr)
        .iter()
        .position(|&c| tree.local_name(c).is_some_and(|name| rank(name) > new_rank))
        .unwrap_or(tree.children(rpr).len());
    let child = tree.create_element(W_NS, local);
    tree.insert_child(rpr, index, child);
    child
}

fn set_toggle(tree: &mut XmlTree, rpr: NodeId, local: &str, on: bool) {
    let el = ensure_rpr_child(tree, rpr, local);
    if on {
        tree.remove_attribute(el, Some(W_NS), "val");
    } else {
        tree.set_attribute(el, Some(W_NS), "val", "0");
    }
}

/// Character formatting this crate reads and propagates.
///
/// `None` means "inherited": the run does not set the property itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStyle {
    pub font_name: Option<String>,
    /// Size in points.
    pub font_size: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

impl RunStyle {
    fn read(tree: &XmlTree, rpr: NodeId) -> Self {
        let font_name = tree.child(rpr, W_NS, "rFonts").and_then(|f| {
            tree.attribute(f, Some(W_NS), "ascii")
                .or_else(|| tree.attribute(f, Some(W_NS), "hAnsi"))
                .map(str::to_owned)
        });
        let font_size = tree
            .child(rpr, W_NS, "sz")
            .and_then(|sz| tree.attribute(sz, Some(W_NS), "val"))
            .and_then(|v| v.parse::<f32>().ok())
            .map(|half_points| half_points / 2.0);
        Self {
            font_name,
            font_size,
            bold: read_toggle(tree, rpr, "b"),
            italic: read_toggle(tree, rpr, "i"),
        }
    }
}

/// A present toggle with no `w:val` (or any value but off) means on.
fn read_toggle(tree: &XmlTree, rpr: NodeId, local: &str) -> Option<bool> {
    tree.child(rpr, W_NS, local).map(|el| {
        !matches!(
            tree.attribute(el, Some(W_NS), "val"),
            Some("0" | "false" | "off")
        )
    })
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Table(pub NodeId);

impl Table {
    pub fn id(self) -> NodeId {
        self.0
    }

    /// Row-major grid of cells by coordinate.
    ///
    /// A cell spanning several grid columns appears once per column, and a
    /// vertical-merge continuation resolves to the cell that started the
    /// merge, so merged content is reachable from every coordinate it covers.
    pub fn grid(self, tree: &XmlTree) -> Vec<Vec<Cell>> {
        let mut grid: Vec<Vec<Cell>> = Vec::new();
        for row in rows(tree, self.0) {
            let mut cells = Vec::new();
            for tc in row_cells(tree, row) {
                let props = tree.child(tc, W_NS, "tcPr");
                let span = props
                    .and_then(|p| tree.child(p, W_NS, "gridSpan"))
                    .and_then(|g| tree.attribute(g, Some(W_NS), "val"))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                let continues = props
                    .and_then(|p| tree.child(p, W_NS, "vMerge"))
                    .is_some_and(|v| tree.attribute(v, Some(W_NS), "val") != Some("restart"));

                for _ in 0..span {
                    let column = cells.len();
                    let above = grid.last().and_then(|prev| prev.get(column)).copied();
                    let cell = match above {
                        Some(above) if continues => above,
                        _ => Cell(tc),
                    };
                    cells.push(cell);
                }
            }
            grid.push(cells);
        }
        grid
    }
}

fn rows(tree: &XmlTree, table: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_named(tree, table, "tr", &mut out);
    out
}

fn row_cells(tree: &XmlTree, row: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_named(tree, row, "tc", &mut out);
    out
}

fn collect_named(tree: &XmlTree, parent: NodeId, local: &str, out: &mut Vec<NodeId>) {
    for child in tree.child_elements(parent) {
        if tree.is(child, W_NS, local) {
            out.push(child);
        } else if is_w(tree, child, BLOCK_WRAPPERS) {
            collect_named(tree, child, local, out);
        }
    }
}

/// A table cell: a mini-document of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell(pub NodeId);

impl Cell {
    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn blocks(self, tree: &XmlTree) -> Vec<Block> {
        blocks(tree, self.0)
    }

    pub fn paragraphs(self, tree: &XmlTree) -> Vec<Paragraph> {
        split_blocks(&self.blocks(tree)).0
    }
}

// ---------------------------------------------------------------------------
// Text boxes
// ---------------------------------------------------------------------------

/// Every `w:txbxContent` under `root`, depth-first in document order.
///
/// With `skip_fallback`, boxes under `mc:Fallback` are ignored: they repeat
/// the `mc:Choice` rendering of the same shape.
pub fn text_boxes(tree: &XmlTree, root: NodeId, skip_fallback: bool) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if skip_fallback && tree.is(node, MC_NS, "Fallback") {
            continue;
        }
        if tree.is(node, W_NS, "txbxContent") {
            out.push(node);
        }
        stack.extend(tree.child_elements(node).collect::<Vec<_>>().into_iter().rev());
    }
    out
}
