//! Retained drawing surface: a tree of SVG-like nodes.
//!
//! Nodes carry attributes, inline styles, optional text, an optional bound
//! [`Datum`], an optional geometry (redrawn into `d` whenever the owning
//! projection changes) and declarative event handlers of type `H`.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use foundation::handles::Handle;
use foundation::math::Geometry;

use crate::node::{Datum, EventName, NodeId};

#[derive(Debug, Clone)]
struct Node<H> {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: Option<String>,
    datum: Option<Datum>,
    geometry: Option<Geometry>,
    handlers: Vec<(EventName, H)>,
}

impl<H> Node<H> {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            parent: None,
            children: Vec::new(),
            attrs: BTreeMap::new(),
            styles: BTreeMap::new(),
            text: None,
            datum: None,
            geometry: None,
            handlers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document<H> {
    nodes: Vec<Option<Node<H>>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    by_element_id: HashMap<String, NodeId>,
    root: NodeId,
}

impl<H> Default for Document<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Document<H> {
    /// A document holding a single `body` root.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            by_element_id: HashMap::new(),
            root: NodeId(Handle::new(0, 0)),
        };
        doc.root = doc.create("body");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node<H>> {
        let idx = id.index() as usize;
        if self.generations.get(idx) != Some(&id.0.generation()) {
            return None;
        }
        self.nodes.get(idx).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<H>> {
        let idx = id.index() as usize;
        if self.generations.get(idx) != Some(&id.0.generation()) {
            return None;
        }
        self.nodes.get_mut(idx).and_then(|n| n.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a detached node.
    pub fn create(&mut self, tag: &str) -> NodeId {
        if let Some(idx) = self.free.pop() {
            let i = idx as usize;
            self.nodes[i] = Some(Node::new(tag));
            return NodeId(Handle::new(idx, self.generations[i]));
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(Some(Node::new(tag)));
        self.generations.push(0);
        NodeId(Handle::new(idx, 0))
    }

    /// Create a node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let child = self.create(tag);
        self.append_child(parent, child);
        child
    }

    /// Move `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn get_by_element_id(&self, element_id: &str) -> Option<NodeId> {
        self.by_element_id
            .get(element_id)
            .copied()
            .filter(|id| self.contains(*id))
    }

    /// Set an attribute. Setting `id` re-indexes the node; the most recent
    /// node to claim an element id wins lookups.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let previous = node.attrs.insert(name.to_string(), value.clone());
        if name == "id" {
            if let Some(prev) = previous
                && self.by_element_id.get(&prev) == Some(&id)
            {
                self.by_element_id.remove(&prev);
            }
            self.by_element_id.insert(value, id);
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.attrs.get(name))
            .map(String::as_str)
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let previous = node.attrs.remove(name);
        if name == "id"
            && let Some(prev) = previous
            && self.by_element_id.get(&prev) == Some(&id)
        {
            self.by_element_id.remove(&prev);
        }
    }

    pub fn set_style(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.styles.insert(name.to_string(), value.into());
        }
    }

    pub fn style(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.styles.get(name))
            .map(String::as_str)
    }

    pub fn remove_style(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.node_mut(id) {
            node.styles.remove(name);
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: Option<String>) {
        if let Some(node) = self.node_mut(id) {
            node.text = text;
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.text.as_deref())
    }

    pub fn set_datum(&mut self, id: NodeId, datum: Datum) {
        if let Some(node) = self.node_mut(id) {
            node.datum = Some(datum);
        }
    }

    pub fn datum(&self, id: NodeId) -> Option<&Datum> {
        self.node(id).and_then(|n| n.datum.as_ref())
    }

    pub fn set_geometry(&mut self, id: NodeId, geometry: Geometry) {
        if let Some(node) = self.node_mut(id) {
            node.geometry = Some(geometry);
        }
    }

    pub fn geometry(&self, id: NodeId) -> Option<&Geometry> {
        self.node(id).and_then(|n| n.geometry.as_ref())
    }

    /// Detach `id` and free it together with its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if !self.contains(id) || id == self.root {
            return;
        }
        self.detach(id);
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let idx = id.index() as usize;
        let Some(node) = self.nodes.get_mut(idx).and_then(Option::take) else {
            return;
        };
        if let Some(element_id) = node.attrs.get("id")
            && self.by_element_id.get(element_id) == Some(&id)
        {
            self.by_element_id.remove(element_id);
        }
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free.push(idx as u32);
        for child in node.children {
            self.free_subtree(child);
        }
    }

    /// Remove every child of `id`, keeping `id` itself.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    /// Stable sort of `id`'s children by a key computed once per child.
    pub fn sort_children_by_key<K: Ord>(&mut self, id: NodeId, mut key: impl FnMut(&Self, NodeId) -> K) {
        let mut keyed: Vec<(K, NodeId)> = self
            .children(id)
            .iter()
            .map(|c| (key(self, *c), *c))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(node) = self.node_mut(id) {
            node.children = keyed.into_iter().map(|(_, c)| c).collect();
        }
    }

    /// Pre-order descendants of `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn descendants_by_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.tag(*n) == Some(tag))
            .collect()
    }

    /// Descendants of `id` whose `class` attribute contains `class`.
    pub fn select_by_class(&self, id: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| {
                self.attr(*n, "class")
                    .is_some_and(|c| c.split_whitespace().any(|t| t == class))
            })
            .collect()
    }

    /// Register `handler` for `event` (`type` or `type.namespace`), replacing
    /// an existing handler with the same name.
    pub fn on(&mut self, id: NodeId, event: &str, handler: H) {
        let name = EventName::parse(event);
        if let Some(node) = self.node_mut(id) {
            node.handlers.retain(|(n, _)| *n != name);
            node.handlers.push((name, handler));
        }
    }

    /// Remove handlers matching `event`; `.namespace` removes the namespace
    /// from every type.
    pub fn off(&mut self, id: NodeId, event: &str) {
        let pattern = EventName::parse(event);
        if let Some(node) = self.node_mut(id) {
            node.handlers.retain(|(n, _)| !pattern.matches(n));
        }
    }

    /// Handlers listening for `kind`, in registration order.
    pub fn handlers_for(&self, id: NodeId, kind: &str) -> Vec<&H> {
        self.node(id)
            .map(|n| {
                n.handlers
                    .iter()
                    .filter(|(name, _)| name.kind == kind)
                    .map(|(_, h)| h)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serialize `id` and its subtree as markup.
    pub fn to_svg(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, 0);
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId, depth: usize) {
        let Some(node) = self.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}<{}", node.tag);
        for (k, v) in &node.attrs {
            let _ = write!(out, " {k}=\"{}\"", escape(v));
        }
        if !node.styles.is_empty() {
            let style: Vec<String> = node.styles.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            let _ = write!(out, " style=\"{}\"", escape(&style.join(";")));
        }
        if node.children.is_empty() && node.text.is_none() {
            out.push_str("/>\n");
            return;
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&escape(text));
        }
        if !node.children.is_empty() {
            out.push('\n');
            for child in &node.children {
                self.write_node(out, *child, depth + 1);
            }
            out.push_str(&indent);
        }
        let _ = writeln!(out, "</{}>", node.tag);
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
