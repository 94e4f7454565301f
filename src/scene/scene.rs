use glam::Affine3A;
use slotmap::SlotMap;

use crate::renderer::RenderPrimitiveId;
use crate::scene::NodeHandle;
use crate::scene::node::Node;

/// Scene graph
///
/// Owns every node in a slot-map arena. The scene always has a root node;
/// nodes not reachable from the root exist but are not drawn from
/// [`Renderer::draw_scene`](crate::renderer::Renderer::draw_scene).
pub struct Scene {
    nodes: SlotMap<NodeHandle, Node>,
    root: NodeHandle,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::with_name("root"));
        Self { nodes, root }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a detached node.
    pub fn create_node(&mut self, node: Node) -> NodeHandle {
        self.nodes.insert(node)
    }

    /// Inserts `node` as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeHandle, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.add_child(parent, handle);
        handle
    }

    /// Makes `child` the last child of `parent`, detaching it from any
    /// previous parent. Refuses to create cycles.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        if parent == child
            || !self.nodes.contains_key(parent)
            || !self.nodes.contains_key(child)
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
        true
    }

    /// Removes `child` from its parent's children. The node stays alive.
    pub fn detach(&mut self, child: NodeHandle) {
        let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
    }

    /// Removes a node and its whole subtree. Returns the removed nodes.
    ///
    /// The root cannot be removed.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Vec<(NodeHandle, Node)> {
        if handle == self.root || !self.nodes.contains_key(handle) {
            return Vec::new();
        }
        self.detach(handle);

        let mut removed = Vec::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend_from_slice(&node.children);
                removed.push((current, node));
            }
        }
        removed
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.nodes.get(handle).and_then(|n| n.parent);
        }
        false
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name.as_deref() == Some(name))
            .map(|(handle, _)| handle)
    }

    /// World matrix computed from the current transforms up the parent
    /// chain, independent of the last traversal.
    #[must_use]
    pub fn compute_world_matrix(&self, handle: NodeHandle) -> Option<Affine3A> {
        let mut node = self.nodes.get(handle)?;
        let mut world = node.transform.compute_local_matrix();
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(p)) {
            world = parent.transform.compute_local_matrix() * world;
            node = parent;
        }
        Some(world)
    }

    /// Refreshes cached world matrices for the subtree under `root`.
    pub fn update_world_matrices(&mut self, root: NodeHandle) {
        let parent_world = self
            .nodes
            .get(root)
            .and_then(|n| n.parent)
            .and_then(|p| self.compute_world_matrix(p))
            .unwrap_or(Affine3A::IDENTITY);
        self.traverse(root, parent_world, false, &mut |_, _| {});
    }

    /// Marks the visible part of the subtree under `root` active for
    /// `frame_id`.
    ///
    /// Invisible nodes and everything below them are skipped. Every visible
    /// node with render primitives is stamped with `frame_id`, and
    /// `on_primitive` is called once per instanced primitive. World matrices
    /// of visited nodes are refreshed on the way down.
    pub fn mark_active(
        &mut self,
        root: NodeHandle,
        frame_id: u64,
        mut on_primitive: impl FnMut(RenderPrimitiveId),
    ) {
        let parent_world = self
            .nodes
            .get(root)
            .and_then(|n| n.parent)
            .and_then(|p| self.compute_world_matrix(p))
            .unwrap_or(Affine3A::IDENTITY);
        self.traverse(root, parent_world, true, &mut |node, _| {
            if !node.render_primitives.is_empty() {
                node.active_frame_id = frame_id;
                for &primitive in &node.render_primitives {
                    on_primitive(primitive);
                }
            }
        });
    }

    fn traverse(
        &mut self,
        root: NodeHandle,
        parent_world: Affine3A,
        visible_only: bool,
        visit: &mut dyn FnMut(&mut Node, NodeHandle),
    ) {
        let mut stack = vec![(root, parent_world)];
        while let Some((handle, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            if visible_only && !node.visible {
                continue;
            }
            node.transform.update_local_matrix();
            let world = parent_world * node.transform.local_matrix;
            node.transform.set_world_matrix(world);
            visit(node, handle);
            // Reverse so children are visited in declaration order.
            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }
}
