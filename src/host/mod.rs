//! Boundary to the hosting document model.
//!
//! The generator never talks to a concrete canvas API directly. Everything it
//! needs from the host (page management, section cloning, the global active
//! page pointer, font loading) goes through the [`DocumentHost`] trait so the
//! pipeline can be driven against the in-memory implementation in tests and
//! dry runs.
//!
//! One host peculiarity leaks through this boundary on purpose: calling
//! [`DocumentHost::set_active`] is a *request*. The host may apply it
//! asynchronously, so callers that depend on the active page must confirm it
//! via [`DocumentHost::active`] before mutating anything. The cursor guard in
//! [`crate::guard`] exists to do exactly that.

mod memory;

pub use memory::{DocumentSnapshot, FontSnapshot, MemoryHost, PageSnapshot, SectionSnapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle to a node in the host document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The node types the generator cares about. Anything else the host holds is
/// invisible through this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Page,
    Section,
    Frame,
    Text,
}

/// A (family, style) pair identifying a host font.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontRef {
    pub family: String,
    pub style: String,
}

impl FontRef {
    pub fn new(family: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            style: style.into(),
        }
    }
}

impl std::fmt::Display for FontRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.family, self.style)
    }
}

#[derive(Debug, Error)]
#[error("font {font} is not available in the host")]
pub struct FontLoadError {
    pub font: FontRef,
}

/// Host document operations used by the generation pipeline.
///
/// Implementations take `&self`; hosts are expected to manage their own
/// interior mutability, and the pipeline only ever drives them from one task.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Top-level pages in document order.
    fn pages(&self) -> Vec<NodeId>;

    fn node_name(&self, node: NodeId) -> Option<String>;
    fn node_kind(&self, node: NodeId) -> Option<NodeKind>;
    fn node_size(&self, node: NodeId) -> Option<(f64, f64)>;

    /// Direct children only. Never recurses.
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn create_page(&self, name: &str) -> NodeId;

    /// Removes a node and its subtree. Returns false if the node is unknown
    /// or the host refuses (e.g. removing the last remaining page).
    fn remove_node(&self, node: NodeId) -> bool;

    /// Requests that `page` become the active page. May settle asynchronously;
    /// confirm via [`Self::active`].
    fn set_active(&self, page: NodeId);

    /// The page the host currently considers active.
    fn active(&self) -> NodeId;

    /// Clones a section. The host decides the clone's initial parent, which
    /// is whatever page it considers active at that instant. Under
    /// propagation lag that may not be the page the caller intended.
    fn clone_section(&self, section: NodeId) -> NodeId;

    /// Moves `node` so that `page` is its parent.
    fn append_to_page(&self, node: NodeId, page: NodeId);

    fn set_position(&self, node: NodeId, x: f64, y: f64);

    /// Creates a dashed placeholder frame carrying the section name and a
    /// human-readable explanation of why the real section is absent.
    fn create_placeholder(
        &self,
        page: NodeId,
        section_name: &str,
        label: &str,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> NodeId;

    /// Distinct fonts referenced by text nodes anywhere inside `section`.
    fn section_fonts(&self, section: NodeId) -> Vec<FontRef>;

    async fn load_font(&self, font: &FontRef) -> Result<(), FontLoadError>;
}
