//! Pointer picking and hover tracking.
//!
//! Pointers are rigid transforms whose -Z axis is the target ray. Only
//! visible, selectable nodes with bounded render primitives can be hit.

use glam::{Affine3A, Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::renderer::Renderer;
use crate::renderer::gl::GlContext;
use crate::scene::{NodeHandle, Ray, Scene};

/// Distance along the ray at which the cursor is placed on a miss.
const CURSOR_MISS_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub node: NodeHandle,
    /// World-space hit point.
    pub intersection: Vec3,
    /// World-space distance from the ray origin.
    pub distance: f32,
}

/// Casts the ray described by `target_ray` into the scene and returns the
/// nearest hit.
///
/// Every render primitive bounds test runs in the node's local space. Nodes
/// that are not visible hide their whole subtree; nodes that are not
/// selectable are passed through but still let their children be hit.
#[must_use]
pub fn hit_test<C: GlContext>(
    scene: &Scene,
    renderer: &Renderer<C>,
    target_ray: &Mat4,
) -> Option<HitResult> {
    let world_ray = Ray::from_transform(target_ray);
    let mut best: Option<HitResult> = None;

    let mut stack = vec![(scene.root(), Affine3A::IDENTITY)];
    while let Some((handle, parent_world)) = stack.pop() {
        let Some(node) = scene.get(handle) else {
            continue;
        };
        if !node.visible {
            continue;
        }
        let world = parent_world * node.transform.compute_local_matrix();

        if node.selectable && !node.render_primitives().is_empty() {
            let local_ray = Ray::from_transform(&(Mat4::from(world.inverse()) * *target_ray));
            for &id in node.render_primitives() {
                let Some(bounds) = renderer.render_primitive(id).bounds() else {
                    continue;
                };
                let Some(local_hit) = local_ray.intersects_aabb(&bounds) else {
                    continue;
                };
                let intersection = world.transform_point3(local_hit);
                let distance = intersection.distance(world_ray.origin());
                if best.is_none_or(|b| distance < b.distance) {
                    best = Some(HitResult {
                        node: handle,
                        intersection,
                        distance,
                    });
                }
            }
        }

        for &child in node.children() {
            stack.push((child, world));
        }
    }
    best
}

/// The node a select action along `target_ray` lands on.
#[must_use]
pub fn select<C: GlContext>(
    scene: &Scene,
    renderer: &Renderer<C>,
    target_ray: &Mat4,
) -> Option<NodeHandle> {
    hit_test(scene, renderer, target_ray).map(|hit| hit.node)
}

/// One input source's target ray for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    /// Stable id of the input source across frames.
    pub source: u32,
    pub target_ray: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverEvent {
    Start(NodeHandle),
    End(NodeHandle),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverUpdate {
    pub events: Vec<HoverEvent>,
    /// One cursor position per pointer, in input order.
    pub cursors: Vec<Vec3>,
}

/// Tracks which nodes are hovered by which input sources across frames.
///
/// Each (node, source) pair carries the frame it was last hovered in. A node
/// starts being hovered when its first source arrives and stops when its
/// last source leaves, however many sources point at it in between.
#[derive(Debug, Default)]
pub struct HoverTracker {
    frame: u64,
    watermarks: FxHashMap<(NodeHandle, u32), u64>,
    hovered: Vec<NodeHandle>,
}

impl HoverTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes hovered as of the last update, in first-hit order.
    #[must_use]
    pub fn hovered(&self) -> &[NodeHandle] {
        &self.hovered
    }

    #[must_use]
    pub fn is_hovered_by(&self, node: NodeHandle, source: u32) -> bool {
        self.watermarks.get(&(node, source)) == Some(&self.frame)
    }

    pub fn update<C: GlContext>(
        &mut self,
        scene: &Scene,
        renderer: &Renderer<C>,
        pointers: &[Pointer],
    ) -> HoverUpdate {
        self.frame += 1;
        let frame = self.frame;

        let mut update = HoverUpdate {
            events: Vec::new(),
            cursors: Vec::with_capacity(pointers.len()),
        };
        let mut now_hovered: Vec<NodeHandle> = Vec::new();

        for pointer in pointers {
            match hit_test(scene, renderer, &pointer.target_ray) {
                Some(hit) => {
                    update.cursors.push(hit.intersection);
                    self.watermarks.insert((hit.node, pointer.source), frame);
                    if !now_hovered.contains(&hit.node) {
                        now_hovered.push(hit.node);
                    }
                }
                None => {
                    let ray = Ray::from_transform(&pointer.target_ray);
                    update.cursors.push(ray.at(CURSOR_MISS_DISTANCE));
                }
            }
        }

        self.watermarks.retain(|_, last| *last == frame);

        for &node in &now_hovered {
            if !self.hovered.contains(&node) {
                update.events.push(HoverEvent::Start(node));
            }
        }
        for &node in &self.hovered {
            if !now_hovered.contains(&node) {
                update.events.push(HoverEvent::End(node));
            }
        }
        self.hovered = now_hovered;

        update
    }

    /// Drops all hover state without emitting events.
    pub fn clear(&mut self) {
        self.watermarks.clear();
        self.hovered.clear();
    }
}
