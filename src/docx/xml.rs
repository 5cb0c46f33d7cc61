//! Owned, mutable XML tree for package parts.
//!
//! `roxmltree` gives a fast read-only view; the reconciler needs to rewrite
//! runs in place, so every parsed part is imported into a flat arena of
//! nodes addressed by [`NodeId`]. A `NodeId` is the stable structural
//! identity of a node for the lifetime of the tree: detached nodes keep their
//! slot, so identities never shift under mutation.
//!
//! Serialization writes back the original prefixes and only the namespace
//! declarations each element introduced, so an untouched subtree
//! round-trips to equivalent WordprocessingML.

use std::fmt::Write as _;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of a node inside an [`XmlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Namespace-qualified name as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub ns: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    fn write(&self, out: &mut String) {
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
            out.push(':');
        }
        out.push_str(&self.local);
    }

    fn is(&self, ns: Option<&str>, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == ns
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    /// Declarations introduced on this element: `(prefix, uri)`, `None` = default namespace.
    pub namespaces: Vec<(Option<String>, String)>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: Option<String> },
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed XML document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
    root: NodeId,
    /// Namespaces in scope at the root element, used to prefix new nodes.
    bindings: Vec<(Option<String>, String)>,
}

impl XmlTree {
    /// Parse `text` into an owned tree.
    ///
    /// # Errors
    ///
    /// Returns the `roxmltree` error when the text is not well-formed XML.
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)?;
        let root = doc.root_element();

        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            bindings: root
                .namespaces()
                .filter(|ns| ns.name() != Some("xml"))
                .map(|ns| (ns.name().map(str::to_owned), ns.uri().to_owned()))
                .collect(),
        };
        tree.root = tree.import(root, None);
        Ok(tree)
    }

    fn import(&mut self, node: roxmltree::Node<'_, '_>, parent: Option<NodeId>) -> NodeId {
        let data = if node.is_element() {
            NodeData::Element(import_element(node))
        } else if let Some(pi) = node.pi() {
            NodeData::ProcessingInstruction {
                target: pi.target.to_owned(),
                value: pi.value.map(str::to_owned),
            }
        } else if node.is_comment() {
            NodeData::Comment(node.text().unwrap_or_default().to_owned())
        } else {
            NodeData::Text(node.text().unwrap_or_default().to_owned())
        };

        let id = self.push(data);
        self.nodes[id.0].parent = parent;
        for child in node.children() {
            let child_id = self.import(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    // -- Navigation ---------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True if `id` is an element named `local` in namespace `ns`.
    pub fn is(&self, id: NodeId, ns: &str, local: &str) -> bool {
        self.element(id).is_some_and(|el| el.name.is(Some(ns), local))
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.local.as_str())
    }

    pub fn namespace(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|el| el.name.ns.as_deref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element children only, in document order.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
    }

    /// First element child named `local` in `ns`.
    pub fn child(&self, id: NodeId, ns: &str, local: &str) -> Option<NodeId> {
        self.child_elements(id).find(|&c| self.is(c, ns, local))
    }

    /// All nodes below `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// True if `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.parent(p);
        }
        false
    }

    pub fn attribute(&self, id: NodeId, ns: Option<&str>, local: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|a| a.name.is(ns, local))
            .map(|a| a.value.as_str())
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(t) = self.data(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let NodeData::Text(t) = self.data(d) {
                out.push_str(t);
            }
        }
        out
    }

    // -- Mutation -----------------------------------------------------------

    /// Create a detached element, reusing the prefix bound to `ns` at the root.
    pub fn create_element(&mut self, ns: &str, local: &str) -> NodeId {
        let prefix = self.prefix_for(ns, false);
        self.push(NodeData::Element(Element {
            name: QName {
                ns: Some(ns.to_owned()),
                prefix,
                local: local.to_owned(),
            },
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_owned()))
    }

    /// Set (or add) an attribute. `ns = None` means an unqualified attribute.
    pub fn set_attribute(&mut self, id: NodeId, ns: Option<&str>, local: &str, value: &str) {
        let prefix = ns.and_then(|uri| self.prefix_for(uri, true));
        let NodeData::Element(el) = &mut self.nodes[id.0].data else {
            return;
        };
        if let Some(attr) = el.attributes.iter_mut().find(|a| a.name.is(ns, local)) {
            value.clone_into(&mut attr.value);
            return;
        }
        el.attributes.push(Attribute {
            name: QName {
                ns: ns.map(str::to_owned),
                prefix,
                local: local.to_owned(),
            },
            value: value.to_owned(),
        });
    }

    pub fn remove_attribute(&mut self, id: NodeId, ns: Option<&str>, local: &str) {
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            el.attributes.retain(|a| !a.name.is(ns, local));
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.nodes[parent.0].children.len();
        self.insert_child(parent, index, child);
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `node` immediately before `anchor` under the same parent.
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        if let Some(parent) = self.parent(anchor) {
            let index = self.index_of(parent, anchor).unwrap_or(0);
            self.insert_child(parent, index, node);
        }
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Unlink `id` from its parent. The node and its subtree stay allocated.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Copy the subtree rooted at `id` into new, detached nodes.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let copy = self.push(data);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    fn prefix_for(&mut self, ns: &str, attribute: bool) -> Option<String> {
        if ns == XML_NS {
            return Some("xml".to_owned());
        }
        let bound = self
            .bindings
            .iter()
            .filter(|(_, uri)| uri == ns)
            .map(|(prefix, _)| prefix.clone())
            .find(|prefix| !attribute || prefix.is_some());
        if let Some(prefix) = bound {
            return prefix;
        }

        // Unbound namespace: declare a fresh prefix on the root element.
        let prefix = format!("ns{}", self.bindings.len());
        self.bindings.push((Some(prefix.clone()), ns.to_owned()));
        if let NodeData::Element(root) = &mut self.nodes[self.root.0].data {
            root.namespaces.push((Some(prefix.clone()), ns.to_owned()));
        }
        Some(prefix)
    }

    // -- Serialization ------------------------------------------------------

    /// Serialize the tree with a standalone XML declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 24);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Element(el) => {
                out.push('<');
                el.name.write(out);
                for (prefix, uri) in &el.namespaces {
                    match prefix {
                        Some(p) => {
                            let _ = write!(out, " xmlns:{p}=\"");
                        }
                        None => out.push_str(" xmlns=\""),
                    }
                    escape_attribute(uri, out);
                    out.push('"');
                }
                for attr in &el.attributes {
                    out.push(' ');
                    attr.name.write(out);
                    out.push_str("=\"");
                    escape_attribute(&attr.value, out);
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                el.name.write(out);
                out.push('>');
            }
            NodeData::Text(text) => escape_text(text, out),
            NodeData::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeData::ProcessingInstruction { target, value } => match value {
                Some(v) => {
                    let _ = write!(out, "<?{target} {v}?>");
                }
                None => {
                    let _ = write!(out, "<?{target}?>");
                }
            },
        }
    }
}

fn import_element(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let name = QName {
        ns: tag.namespace().map(str::to_owned),
        prefix: tag.namespace().and_then(|uri| scope_prefix(node, uri, false)),
        local: tag.name().to_owned(),
    };

    let attributes = node
        .attributes()
        .map(|a| Attribute {
            name: QName {
                ns: a.namespace().map(str::to_owned),
                prefix: a.namespace().and_then(|uri| scope_prefix(node, uri, true)),
                local: a.name().to_owned(),
            },
            value: a.value().to_owned(),
        })
        .collect();

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    let namespaces = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().map(str::to_owned), ns.uri().to_owned()))
        .collect();

    Element {
        name,
        attributes,
        namespaces,
    }
}

/// Prefix bound to `uri` in `node`'s scope. Attributes never use the default namespace.
fn scope_prefix(node: roxmltree::Node<'_, '_>, uri: &str, attribute: bool) -> Option<String> {
    if uri == XML_NS {
        return Some("xml".to_owned());
    }
    let mut candidates = node.namespaces().filter(|ns| ns.uri() == uri);
    if attribute {
        candidates
            .find(|ns| ns.name().is_some())
            .and_then(|ns| ns.name().map(str::to_owned))
    } else {
        // Prefer the default namespace only when no prefix is bound.
        let all: Vec<Option<&str>> = candidates.by_ref().map(|ns| ns.name()).collect();
        all.iter()
            .copied()
            .find(Option::is_some)
            .or_else(|| all.first().copied())
            .flatten()
            .map(str::to_owned)
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    #[test]
    fn test_round_trip_keeps_prefixes_and_declarations() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">A &amp; B</w:t></w:r></w:p></w:body></w:document>"#;
        let tree = XmlTree::parse(xml).expect("should parse xml");
        let out = tree.to_xml();
        assert!(out.contains(r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#));
        assert!(out.contains(r#"<w:t xml:space="preserve">A &amp; B</w:t>"#));
        // Inner elements do not repeat inherited declarations.
        assert_eq!(out.matches("xmlns:w=").count(), 1);
    }

    #[test]
    fn test_reparse_serialized_output() {
        let xml = r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><!-- note --><w:p><w:r><w:t>&lt;x&gt;</w:t></w:r></w:p></w:hdr>"#;
        let tree = XmlTree::parse(xml).expect("should parse xml");
        let again = XmlTree::parse(&tree.to_xml()).expect("should reparse serialized tree");
        let t = again
            .descendants(again.root())
            .into_iter()
            .find(|&n| again.is(n, W, "t"))
            .expect("should find text element");
        assert_eq!(again.text_content(t), "<x>");
    }

    #[test]
    fn test_create_element_uses_root_prefix() {
        let mut tree = XmlTree::parse(
            r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#,
        )
        .expect("should parse xml");
        let p = tree.create_element(W, "p");
        tree.set_attribute(p, Some(W), "rsidR", "00AB");
        let root = tree.root();
        tree.append_child(root, p);
        assert!(tree.to_xml().contains(r#"<w:p w:rsidR="00AB"/>"#));
    }

    #[test]
    fn test_unbound_namespace_gets_declared() {
        let mut tree = XmlTree::parse("<root/>").expect("should parse xml");
        let el = tree.create_element(W, "p");
        let root = tree.root();
        tree.append_child(root, el);
        let out = tree.to_xml();
        assert!(out.contains(r#"xmlns:ns0="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#));
        assert!(out.contains("<ns0:p/>"));
    }

    #[test]
    fn test_detach_and_insert_keep_identity() {
        let mut tree = XmlTree::parse("<a><b/><c/></a>").expect("should parse xml");
        let root = tree.root();
        let b = tree.children(root)[0];
        let c = tree.children(root)[1];
        tree.insert_before(b, c);
        assert_eq!(tree.children(root), &[c, b]);
        tree.detach(c);
        assert_eq!(tree.children(root), &[b]);
        assert!(tree.parent(c).is_none());
    }

    #[test]
    fn test_deep_clone_is_detached_copy() {
        let mut tree = XmlTree::parse("<a><b><c>x</c></b></a>").expect("should parse xml");
        let root = tree.root();
        let b = tree.children(root)[0];
        let copy = tree.deep_clone(b);
        assert_ne!(copy, b);
        assert!(tree.parent(copy).is_none());
        assert_eq!(tree.text_content(copy), "x");
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(XmlTree::parse("<a><b></a>").is_err());
    }
}
