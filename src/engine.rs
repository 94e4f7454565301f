//! Viewer
//!
//! [`Viewer`] bundles everything a 360 media / glTF viewer needs per GL
//! context: the renderer, the scene, one glTF loader living as long as the
//! renderer, the current skybox and pointer hover state. It has no window
//! or session logic; the host drives it once per frame:
//!
//! ```rust,ignore
//! let mut viewer = Viewer::new(gl, RendererSettings::default(), reader);
//! viewer.set_skybox_image("pano.jpg", StereoLayout::TopBottom, 0.0)?;
//! viewer.load_gltf("models/chair.gltf")?;
//!
//! loop {
//!     let hover = viewer.update_pointers(&pointers);
//!     viewer.draw(&views);
//! }
//! ```

use std::sync::Arc;

use glam::Mat4;

use crate::assets::{AssetReader, GltfLoader, load_image_texture};
use crate::errors::Result;
use crate::renderer::gl::GlContext;
use crate::renderer::{RenderView, Renderer, RendererSettings};
use crate::resources::Texture;
use crate::scene::{
    HoverTracker, HoverUpdate, NodeHandle, Pointer, Scene, StereoLayout, create_skybox, picking,
};

pub struct Viewer<C: GlContext> {
    pub renderer: Renderer<C>,
    pub scene: Scene,

    loader: GltfLoader,
    hover: HoverTracker,
    skybox: Option<NodeHandle>,
    frame_count: u64,
}

impl<C: GlContext> Viewer<C> {
    pub fn new(gl: C, settings: RendererSettings, reader: Arc<dyn AssetReader>) -> Self {
        Self {
            renderer: Renderer::with_settings(gl, settings),
            scene: Scene::new(),
            loader: GltfLoader::new(reader),
            hover: HoverTracker::new(),
            skybox: None,
            frame_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &GltfLoader {
        &self.loader
    }

    #[inline]
    #[must_use]
    pub fn hover(&self) -> &HoverTracker {
        &self.hover
    }

    #[inline]
    #[must_use]
    pub fn skybox(&self) -> Option<NodeHandle> {
        self.skybox
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Loads a glTF document through the viewer's reader.
    pub fn load_gltf(&mut self, uri: &str) -> Result<NodeHandle> {
        self.loader.load_from_path(uri, &mut self.renderer, &mut self.scene)
    }

    pub fn load_gltf_slice(&mut self, bytes: &[u8]) -> Result<NodeHandle> {
        self.loader.load_from_slice(bytes, &mut self.renderer, &mut self.scene)
    }

    /// Replaces the skybox. The previous skybox node is removed.
    pub fn set_skybox(
        &mut self,
        texture: Arc<Texture>,
        layout: StereoLayout,
        rotation_y: f32,
    ) -> Result<NodeHandle> {
        self.clear_skybox();
        let root = self.scene.root();
        let node = create_skybox(&mut self.renderer, &mut self.scene, root, texture, layout, rotation_y)?;
        self.skybox = Some(node);
        Ok(node)
    }

    /// [`set_skybox`](Self::set_skybox) with a panorama read from `uri`.
    /// The sky shows up once the image has been decoded.
    pub fn set_skybox_image(&mut self, uri: &str, layout: StereoLayout, rotation_y: f32) -> Result<NodeHandle> {
        let texture = load_image_texture(self.loader.reader(), uri)?;
        self.set_skybox(Arc::new(texture), layout, rotation_y)
    }

    pub fn clear_skybox(&mut self) {
        if let Some(node) = self.skybox.take() {
            self.renderer.remove_node(&mut self.scene, node);
        }
    }

    /// Removes a node and its subtree from the scene.
    pub fn remove_node(&mut self, node: NodeHandle) {
        if self.skybox == Some(node) {
            self.skybox = None;
        }
        self.renderer.remove_node(&mut self.scene, node);
    }

    /// Hit-tests every pointer and reports hover transitions plus a cursor
    /// position per pointer.
    pub fn update_pointers(&mut self, pointers: &[Pointer]) -> HoverUpdate {
        self.hover.update(&self.scene, &self.renderer, pointers)
    }

    /// The selectable node a select action along `target_ray` lands on.
    #[must_use]
    pub fn select(&self, target_ray: &Mat4) -> Option<NodeHandle> {
        picking::select(&self.scene, &self.renderer, target_ray)
    }

    /// Draws the scene once per view.
    pub fn draw(&mut self, views: &[RenderView]) {
        self.renderer.draw_scene(views, &mut self.scene);
        self.frame_count += 1;
    }
}
