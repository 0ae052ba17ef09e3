//! In-memory [`DocumentHost`] used by tests and dry runs.
//!
//! Behaves like the real host's document tree, including the part that makes
//! the cursor guard necessary: `set_active` does not take effect immediately.
//! The activation lag is expressed in *observations*: a pending activation
//! applies only after `active()` has been sampled a configured number of
//! times, so tests stay deterministic regardless of timer behavior.

use super::{DocumentHost, FontLoadError, FontRef, NodeId, NodeKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Serialized document layout accepted by `--document`, and a convenient way
/// to seed hosts in tests.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSnapshot {
    pub pages: Vec<PageSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSnapshot {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<SectionSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionSnapshot {
    pub name: String,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fonts: Vec<FontSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FontSnapshot {
    pub family: String,
    pub style: String,
}

#[derive(Debug)]
struct Node {
    name: String,
    kind: NodeKind,
    width: f64,
    height: f64,
    x: f64,
    y: f64,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    fonts: Vec<FontRef>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    page_order: Vec<NodeId>,
    next_id: u64,
    active: Option<NodeId>,
    /// A requested activation and how many more `active()` samples must
    /// happen before it applies.
    pending_active: Option<(NodeId, u32)>,
    /// Observations a fresh `set_active` call needs before it settles.
    activation_lag: u32,
    /// When set, `set_active` is ignored entirely.
    deny_activation: bool,
    /// Next N `clone_section` calls land on this page instead of the active one.
    misdirect_clones: Option<(NodeId, u32)>,
    unavailable_fonts: HashSet<FontRef>,
}

/// In-memory document host.
pub struct MemoryHost {
    inner: Mutex<Inner>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// An empty document holding a single blank page, like a freshly created
    /// host file.
    pub fn new() -> Self {
        let host = Self {
            inner: Mutex::new(Inner::default()),
        };
        let page = host.create_page("Page 1");
        host.inner.lock().active = Some(page);
        host
    }

    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        let host = Self::new();
        for page in &snapshot.pages {
            let page_id = host.create_page(&page.name);
            for section in &page.sections {
                let fonts = section
                    .fonts
                    .iter()
                    .map(|f| FontRef::new(f.family.clone(), f.style.clone()))
                    .collect();
                host.add_section_with_fonts(
                    page_id,
                    &section.name,
                    section.width,
                    section.height,
                    fonts,
                );
            }
        }
        host
    }

    pub fn from_snapshot_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: DocumentSnapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Adds a section under `page`. Test/seed helper.
    pub fn add_section(&self, page: NodeId, name: &str, width: f64, height: f64) -> NodeId {
        self.add_section_with_fonts(page, name, width, height, Vec::new())
    }

    pub fn add_section_with_fonts(
        &self,
        page: NodeId,
        name: &str,
        width: f64,
        height: f64,
        fonts: Vec<FontRef>,
    ) -> NodeId {
        let mut inner = self.inner.lock();
        let id = inner.alloc();
        inner.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind: NodeKind::Section,
                width,
                height,
                x: 0.0,
                y: 0.0,
                parent: Some(page),
                children: Vec::new(),
                fonts,
            },
        );
        if let Some(parent) = inner.nodes.get_mut(&page) {
            parent.children.push(id);
        }
        id
    }

    /// Makes every future `set_active` take effect only after `lag` samples
    /// of `active()`.
    pub fn set_activation_lag(&self, lag: u32) {
        self.inner.lock().activation_lag = lag;
    }

    /// Ignore all future `set_active` calls. The active pointer never settles.
    pub fn deny_activation(&self) {
        self.inner.lock().deny_activation = true;
    }

    /// The next `count` clones attach to `page` regardless of the active page.
    pub fn misdirect_clones(&self, page: NodeId, count: u32) {
        self.inner.lock().misdirect_clones = Some((page, count));
    }

    pub fn mark_font_unavailable(&self, font: FontRef) {
        self.inner.lock().unavailable_fonts.insert(font);
    }

    /// Position recorded for a node, for asserting on layout.
    pub fn node_position(&self, node: NodeId) -> Option<(f64, f64)> {
        self.inner.lock().nodes.get(&node).map(|n| (n.x, n.y))
    }

    pub fn page_by_name(&self, name: &str) -> Option<NodeId> {
        let inner = self.inner.lock();
        inner
            .page_order
            .iter()
            .copied()
            .find(|id| inner.nodes.get(id).is_some_and(|n| n.name == name))
    }
}

impl Inner {
    fn alloc(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Samples the active pointer, ticking any pending activation forward.
    fn observe_active(&mut self) -> Option<NodeId> {
        if let Some((target, remaining)) = self.pending_active {
            if remaining == 0 {
                self.active = Some(target);
                self.pending_active = None;
            } else {
                self.pending_active = Some((target, remaining - 1));
            }
        }
        self.active
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.nodes.get(&node).and_then(|n| n.parent);
        if let Some(parent) = parent
            && let Some(parent_node) = self.nodes.get_mut(&parent)
        {
            parent_node.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = None;
        }
    }
}

#[async_trait]
impl DocumentHost for MemoryHost {
    fn pages(&self) -> Vec<NodeId> {
        self.inner.lock().page_order.clone()
    }

    fn node_name(&self, node: NodeId) -> Option<String> {
        self.inner.lock().nodes.get(&node).map(|n| n.name.clone())
    }

    fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.lock().nodes.get(&node).map(|n| n.kind)
    }

    fn node_size(&self, node: NodeId) -> Option<(f64, f64)> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .map(|n| (n.width, n.height))
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn create_page(&self, name: &str) -> NodeId {
        let mut inner = self.inner.lock();
        let id = inner.alloc();
        inner.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind: NodeKind::Page,
                width: 0.0,
                height: 0.0,
                x: 0.0,
                y: 0.0,
                parent: None,
                children: Vec::new(),
                fonts: Vec::new(),
            },
        );
        inner.page_order.push(id);
        id
    }

    fn remove_node(&self, node: NodeId) -> bool {
        let mut inner = self.inner.lock();
        let Some(kind) = inner.nodes.get(&node).map(|n| n.kind) else {
            return false;
        };
        if kind == NodeKind::Page {
            // The host never allows a document with zero pages.
            if inner.page_order.len() <= 1 {
                return false;
            }
            inner.page_order.retain(|p| *p != node);
            if inner.active == Some(node) {
                inner.active = inner.page_order.first().copied();
            }
        }
        inner.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(n) = inner.nodes.remove(&current) {
                stack.extend(n.children);
            }
        }
        true
    }

    fn set_active(&self, page: NodeId) {
        let mut inner = self.inner.lock();
        if inner.deny_activation || !inner.nodes.contains_key(&page) {
            return;
        }
        if inner.activation_lag == 0 {
            inner.active = Some(page);
            inner.pending_active = None;
        } else if inner.pending_active.map(|(target, _)| target) != Some(page) {
            // Re-requesting the already-pending page does not restart the lag.
            inner.pending_active = Some((page, inner.activation_lag));
        }
    }

    fn active(&self) -> NodeId {
        let mut inner = self.inner.lock();
        inner.observe_active().unwrap_or(NodeId(0))
    }

    fn clone_section(&self, section: NodeId) -> NodeId {
        let mut inner = self.inner.lock();
        let landing = match inner.misdirect_clones {
            Some((page, remaining)) if remaining > 0 => {
                inner.misdirect_clones = if remaining == 1 {
                    None
                } else {
                    Some((page, remaining - 1))
                };
                Some(page)
            }
            _ => inner.observe_active(),
        };
        let (name, width, height, fonts) = match inner.nodes.get(&section) {
            Some(n) => (n.name.clone(), n.width, n.height, n.fonts.clone()),
            None => ("<unknown>".to_string(), 0.0, 0.0, Vec::new()),
        };
        let id = inner.alloc();
        inner.nodes.insert(
            id,
            Node {
                name,
                kind: NodeKind::Section,
                width,
                height,
                x: 0.0,
                y: 0.0,
                parent: landing,
                children: Vec::new(),
                fonts,
            },
        );
        if let Some(page) = landing
            && let Some(parent) = inner.nodes.get_mut(&page)
        {
            parent.children.push(id);
        }
        id
    }

    fn append_to_page(&self, node: NodeId, page: NodeId) {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(&page) {
            return;
        }
        inner.detach(node);
        if let Some(n) = inner.nodes.get_mut(&node) {
            n.parent = Some(page);
        }
        if let Some(parent) = inner.nodes.get_mut(&page) {
            parent.children.push(node);
        }
    }

    fn set_position(&self, node: NodeId, x: f64, y: f64) {
        let mut inner = self.inner.lock();
        if let Some(n) = inner.nodes.get_mut(&node) {
            n.x = x;
            n.y = y;
        }
    }

    fn create_placeholder(
        &self,
        page: NodeId,
        section_name: &str,
        label: &str,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> NodeId {
        let mut inner = self.inner.lock();
        let frame = inner.alloc();
        inner.nodes.insert(
            frame,
            Node {
                name: format!("{section_name} ({label})"),
                kind: NodeKind::Frame,
                width,
                height,
                x,
                y,
                parent: Some(page),
                children: Vec::new(),
                fonts: Vec::new(),
            },
        );
        let text = inner.alloc();
        inner.nodes.insert(
            text,
            Node {
                name: label.to_string(),
                kind: NodeKind::Text,
                width: 0.0,
                height: 0.0,
                x,
                y,
                parent: Some(frame),
                children: Vec::new(),
                fonts: Vec::new(),
            },
        );
        if let Some(f) = inner.nodes.get_mut(&frame) {
            f.children.push(text);
        }
        if let Some(p) = inner.nodes.get_mut(&page) {
            p.children.push(frame);
        }
        frame
    }

    fn section_fonts(&self, section: NodeId) -> Vec<FontRef> {
        self.inner
            .lock()
            .nodes
            .get(&section)
            .map(|n| n.fonts.clone())
            .unwrap_or_default()
    }

    async fn load_font(&self, font: &FontRef) -> Result<(), FontLoadError> {
        if self.inner.lock().unavailable_fonts.contains(font) {
            Err(FontLoadError { font: font.clone() })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_lag_delays_the_pointer() {
        let host = MemoryHost::new();
        let first = host.pages()[0];
        let second = host.create_page("Target");
        host.set_activation_lag(2);

        host.set_active(second);
        assert_eq!(host.active(), first);
        assert_eq!(host.active(), first);
        assert_eq!(host.active(), second);
    }

    #[test]
    fn last_page_cannot_be_removed() {
        let host = MemoryHost::new();
        let only = host.pages()[0];
        assert!(!host.remove_node(only));
        assert_eq!(host.pages(), vec![only]);
    }

    #[test]
    fn clone_lands_on_the_active_page() {
        let host = MemoryHost::new();
        let template = host.create_page("Source_Template");
        let section = host.add_section(template, "Push", 100.0, 50.0);
        let target = host.create_page("Out");
        host.set_active(target);

        let clone = host.clone_section(section);
        assert_eq!(host.parent(clone), Some(target));
        assert_eq!(host.node_size(clone), Some((100.0, 50.0)));
    }

    #[test]
    fn snapshot_round_trips_into_a_host() {
        let snapshot: DocumentSnapshot = serde_json::from_str(
            r#"{"pages": [{"name": "Source_Template", "sections": [
                {"name": "Push", "width": 100, "height": 50,
                 "fonts": [{"family": "Inter", "style": "Regular"}]}
            ]}]}"#,
        )
        .unwrap();
        let host = MemoryHost::from_snapshot(&snapshot);
        let page = host.page_by_name("Source_Template").unwrap();
        let children = host.children(page);
        assert_eq!(children.len(), 1);
        assert_eq!(host.node_name(children[0]).as_deref(), Some("Push"));
        assert_eq!(
            host.section_fonts(children[0]),
            vec![FontRef::new("Inter", "Regular")]
        );
    }
}
