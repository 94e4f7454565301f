//! Scene graph module
//!
//! - Node: scene node (parent/child links, transform, instanced primitives)
//! - Transform: position, rotation, scale with cached matrices
//! - Scene: slot-map arena of nodes with a fixed root
//! - Ray / picking: pointer rays, hit testing and hover tracking
//! - Skybox: equirectangular sky sphere construction

pub mod node;
pub mod picking;
pub mod ray;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod skybox;
pub mod transform;

pub use node::Node;
pub use picking::{HitResult, HoverEvent, HoverTracker, HoverUpdate, Pointer, hit_test, select};
pub use ray::Ray;
pub use scene::Scene;
pub use skybox::{StereoLayout, create_skybox};
pub use transform::Transform;

slotmap::new_key_type! {
    /// Handle to a node stored in a [`Scene`].
    pub struct NodeHandle;
}
