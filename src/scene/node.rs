use glam::Affine3A;
use smallvec::SmallVec;

use crate::renderer::RenderPrimitiveId;
use crate::scene::NodeHandle;
use crate::scene::transform::Transform;

/// A scene node.
///
/// # Hierarchy
///
/// Nodes form a tree through parent-child handles stored in the owning
/// [`Scene`](super::Scene). Use the scene's `add_child` / `detach` to keep
/// both sides in sync.
///
/// # Rendering
///
/// A node instances any number of render primitives. It is drawn when it
/// and all its ancestors are visible; `active_frame_id` records the last
/// frame it was found so.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,

    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,

    pub visible: bool,
    /// Whether pointer rays can hit this node.
    pub selectable: bool,

    pub(crate) render_primitives: SmallVec<[RenderPrimitiveId; 2]>,
    pub(crate) active_frame_id: u64,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            selectable: false,
            render_primitives: SmallVec::new(),
            active_frame_id: 0,
        }
    }

    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn render_primitives(&self) -> &[RenderPrimitiveId] {
        &self.render_primitives
    }

    #[inline]
    #[must_use]
    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id
    }

    /// World matrix as of the last traversal.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
