//! Renderer
//!
//! Owns the GL context and every GPU-side object: buffers, textures,
//! programs, render materials and render primitives. Render primitives are
//! kept in one list per [`RenderOrder`] bucket and drawn bucket by bucket,
//! with program, material state and vertex input changes kept to the
//! minimum the draw order allows.

pub mod gl;
pub mod headless;
pub mod program;
pub mod program_cache;
pub mod render_material;
pub mod render_primitive;
pub mod settings;
pub mod state;
pub mod texture_cache;
pub mod view;

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::core::Readiness;
use crate::errors::Result;
use crate::resources::{
    AttributeMask, BufferSource, GeometryBuffer, Material, Primitive, RenderOrder, Texture,
};
use crate::scene::{NodeHandle, Scene};

use self::gl::{BufferTarget, BufferUsage, GlContext};
use self::program::Program;
use self::state::{MaskResets, bind_material_state};

pub use self::gl::Viewport;
pub use self::headless::{GlCall, HeadlessContext};
pub use self::program_cache::{ProgramCache, ProgramId};
pub use self::render_material::{RenderMaterial, RenderMaterialId};
pub use self::render_primitive::{RenderPrimitive, RenderPrimitiveId};
pub use self::settings::{FloatPrecision, RendererSettings};
pub use self::texture_cache::{RenderTexture, RenderTextureId, TextureCache};
pub use self::view::{Eye, RenderView};

pub const PROJECTION_MATRIX: &str = "PROJECTION_MATRIX";
pub const VIEW_MATRIX: &str = "VIEW_MATRIX";
pub const MODEL_MATRIX: &str = "MODEL_MATRIX";
pub const CAMERA_POSITION: &str = "CAMERA_POSITION";
pub const EYE_INDEX: &str = "EYE_INDEX";
pub const LIGHT_DIRECTION: &str = "LIGHT_DIRECTION";
pub const LIGHT_COLOR: &str = "LIGHT_COLOR";

/// Counters for the last drawn frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub program_binds: u32,
    pub material_binds: u32,
    /// Render primitives found active this frame.
    pub active_primitives: u32,
}

pub struct Renderer<C: GlContext> {
    gl: C,
    settings: RendererSettings,
    use_vao: bool,
    frame_id: u64,

    programs: ProgramCache,
    textures: TextureCache,
    materials: Vec<RenderMaterial>,
    material_lookup: FxHashMap<(Uuid, ProgramId), RenderMaterialId>,
    primitives: Vec<RenderPrimitive>,
    buckets: [Vec<RenderPrimitiveId>; RenderOrder::BUCKET_COUNT],

    pending_buffers: Vec<GeometryBuffer>,
    mask_resets: MaskResets,
    camera_positions: Vec<Vec3>,
    stats: FrameStats,
}

impl<C: GlContext> Renderer<C> {
    pub fn new(gl: C) -> Self {
        Self::with_settings(gl, RendererSettings::default())
    }

    pub fn with_settings(gl: C, settings: RendererSettings) -> Self {
        let precision = settings.fragment_precision.unwrap_or(
            if gl.supports_high_precision_fragment() {
                FloatPrecision::Highp
            } else {
                FloatPrecision::Mediump
            },
        );
        let use_vao = settings.use_vertex_array_objects && gl.supports_vertex_array_objects();
        log::info!(
            "Renderer initialized (fragment precision: {}, vertex arrays: {use_vao})",
            precision.as_str()
        );

        Self {
            gl,
            settings,
            use_vao,
            frame_id: 0,
            programs: ProgramCache::new(precision),
            textures: TextureCache::new(),
            materials: Vec::new(),
            material_lookup: FxHashMap::default(),
            primitives: Vec::new(),
            buckets: Default::default(),
            pending_buffers: Vec::new(),
            mask_resets: MaskResets::default(),
            camera_positions: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn context(&self) -> &C {
        &self.gl
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.gl
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[must_use]
    pub fn uses_vertex_array_objects(&self) -> bool {
        self.use_vao
    }

    /// Id of the last drawn frame. Zero before the first draw.
    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    #[must_use]
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn program(&self, id: ProgramId) -> &Program {
        self.programs.get(id)
    }

    #[must_use]
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    #[must_use]
    pub fn render_material(&self, id: RenderMaterialId) -> &RenderMaterial {
        &self.materials[id.index()]
    }

    #[must_use]
    pub fn render_material_count(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn render_primitive(&self, id: RenderPrimitiveId) -> &RenderPrimitive {
        &self.primitives[id.index()]
    }

    #[must_use]
    pub fn render_primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Render primitives in the bucket for `order`, in draw order.
    #[must_use]
    pub fn bucket(&self, order: RenderOrder) -> &[RenderPrimitiveId] {
        &self.buckets[order.bucket()]
    }

    #[must_use]
    pub fn light_direction(&self) -> [f32; 3] {
        self.settings.light_direction
    }

    pub fn set_light_direction(&mut self, direction: [f32; 3]) {
        self.settings.light_direction = direction;
    }

    #[must_use]
    pub fn light_color(&self) -> [f32; 3] {
        self.settings.light_color
    }

    pub fn set_light_color(&mut self, color: [f32; 3]) {
        self.settings.light_color = color;
    }

    // ========================================================================
    // Buffers
    // ========================================================================

    /// Creates a vertex or index buffer.
    ///
    /// Ready data is uploaded immediately. Pending data is uploaded by the
    /// first frame after its completion settles; until then every primitive
    /// reading the buffer is skipped.
    pub fn create_buffer(
        &mut self,
        target: BufferTarget,
        source: impl Into<BufferSource>,
        usage: BufferUsage,
    ) -> GeometryBuffer {
        let buffer = GeometryBuffer::new(target, usage, source.into());
        if upload_buffer(&mut self.gl, &buffer) == Readiness::Pending {
            self.pending_buffers.push(buffer.clone());
        }
        buffer
    }

    /// Writes `data` into `buffer` at byte `offset`.
    ///
    /// A write at offset zero at least as long as the buffer replaces its
    /// whole store; anything else is a sub-range write. A sub-range write
    /// that would run past the end of the store is dropped with a warning,
    /// since buffers only grow through a full replace. Writes to a buffer
    /// whose data has not arrived yet are applied, in order, right after
    /// its initial upload.
    pub fn update_buffer(&mut self, buffer: &GeometryBuffer, data: &[u8], offset: usize) {
        let gl: &mut dyn GlContext = &mut self.gl;
        let (target, usage) = (buffer.target(), buffer.usage());
        buffer.with_state(|state| match state.handle {
            Some(handle) => {
                gl.bind_buffer(target, Some(handle));
                write_buffer(gl, target, usage, &mut state.byte_length, offset, data);
            }
            None if state.failed => {
                log::warn!("Ignoring write to failed buffer {}", buffer.id());
            }
            None => state.deferred_writes.push((offset, data.to_vec())),
        });
    }

    // ========================================================================
    // Textures, materials, primitives
    // ========================================================================

    /// The render texture for `texture`, shared by every texture with the
    /// same key.
    pub fn texture(&mut self, texture: &Arc<Texture>) -> Result<RenderTextureId> {
        self.textures.get_or_create(&mut self.gl, texture)
    }

    /// Creates a render primitive drawing `primitive` with `material`.
    ///
    /// The program is chosen from the material and the primitive's
    /// attributes. Primitives sharing a material and program share one
    /// render material.
    pub fn create_render_primitive(
        &mut self,
        primitive: &Primitive,
        material: &Material,
    ) -> Result<RenderPrimitiveId> {
        let defines = material.program_defines(primitive.attribute_mask());
        let program = self.programs.get_or_create(&mut self.gl, material, defines)?;

        let material_id = match self.material_lookup.get(&(material.uuid(), program)) {
            Some(&id) => id,
            None => {
                let render_material = RenderMaterial::new(
                    &mut self.gl,
                    material,
                    program,
                    &mut self.programs,
                    &mut self.textures,
                )?;
                let id = RenderMaterialId(self.materials.len() as u32);
                self.materials.push(render_material);
                self.material_lookup.insert((material.uuid(), program), id);
                id
            }
        };

        let order = self.materials[material_id.index()].render_order();
        let id = RenderPrimitiveId(self.primitives.len() as u32);
        self.primitives.push(RenderPrimitive::new(primitive, material_id));
        self.buckets[order.bucket()].push(id);

        log::debug!("Created render primitive {} ({order:?}, program {})", id.index(), program.index());
        Ok(id)
    }

    /// Creates a render primitive and a new child of `parent` instancing it.
    pub fn create_mesh(
        &mut self,
        scene: &mut Scene,
        parent: NodeHandle,
        primitive: &Primitive,
        material: &Material,
    ) -> Result<NodeHandle> {
        let id = self.create_render_primitive(primitive, material)?;
        let node = scene.add_node(parent, crate::scene::Node::new());
        self.attach_render_primitive(scene, node, id);
        Ok(node)
    }

    /// Makes `node` an instance of render primitive `id`.
    pub fn attach_render_primitive(&mut self, scene: &mut Scene, node: NodeHandle, id: RenderPrimitiveId) {
        let Some(n) = scene.get_mut(node) else {
            return;
        };
        if n.render_primitives.contains(&id) {
            return;
        }
        n.render_primitives.push(id);
        self.primitives[id.index()].add_instance(node);
    }

    pub fn detach_render_primitive(&mut self, scene: &mut Scene, node: NodeHandle, id: RenderPrimitiveId) {
        if let Some(n) = scene.get_mut(node) {
            n.render_primitives.retain(|p| *p != id);
        }
        self.primitives[id.index()].remove_instance(node);
    }

    /// Removes `node` and its subtree from `scene`, dropping them as
    /// instances of their render primitives.
    pub fn remove_node(&mut self, scene: &mut Scene, node: NodeHandle) -> usize {
        let removed = scene.remove_node(node);
        for (handle, node) in &removed {
            for id in node.render_primitives() {
                self.primitives[id.index()].remove_instance(*handle);
            }
        }
        removed.len()
    }

    /// Sets a uniform on a render material. Returns false for unknown names.
    pub fn set_material_uniform(&mut self, id: RenderMaterialId, name: &str, value: &[f32]) -> bool {
        self.materials[id.index()].set_uniform(name, value)
    }

    /// Swaps the texture of a sampler slot on a render material.
    pub fn set_material_texture(
        &mut self,
        id: RenderMaterialId,
        name: &str,
        texture: Option<&Arc<Texture>>,
    ) -> Result<bool> {
        let texture = match texture {
            Some(texture) => Some(self.textures.get_or_create(&mut self.gl, texture)?),
            None => None,
        };
        Ok(self.materials[id.index()].set_texture(name, texture))
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Draws the whole scene.
    pub fn draw_scene(&mut self, views: &[RenderView], scene: &mut Scene) {
        let root = scene.root();
        self.draw_views(views, scene, root);
    }

    /// Draws the subtree under `root` once per view.
    ///
    /// Pending buffers and textures are polled first. Primitives whose
    /// buffers or textures are not uploaded yet are skipped this frame.
    pub fn draw_views(&mut self, views: &[RenderView], scene: &mut Scene, root: NodeHandle) {
        if views.is_empty() || !scene.contains(root) {
            return;
        }

        self.frame_id += 1;
        self.poll_resources();
        self.stats = FrameStats::default();
        let frame_id = self.frame_id;

        {
            let Self { gl, primitives, materials, textures, stats, .. } = self;
            scene.mark_active(root, frame_id, |id| {
                let primitive = &mut primitives[id.index()];
                if primitive.active_frame_id == frame_id || !primitive.is_complete() {
                    return;
                }
                let material = &mut materials[primitive.material().index()];
                if material.mark_active(frame_id, textures, &mut *gl) {
                    primitive.active_frame_id = frame_id;
                    stats.active_primitives += 1;
                }
            });
        }

        if views.len() == 1 {
            if let Some(viewport) = views[0].viewport {
                self.gl.viewport(viewport);
            }
        }
        self.camera_positions.clear();
        self.camera_positions.extend(views.iter().map(RenderView::camera_position));

        for bucket in 0..RenderOrder::BUCKET_COUNT {
            self.draw_bucket(bucket, views, scene);
        }

        if self.use_vao {
            self.gl.bind_vertex_array(None);
        }
        self.mask_resets.restore(&mut self.gl);

        log::trace!("Frame {frame_id}: {:?}", self.stats);
    }

    fn draw_bucket(&mut self, bucket: usize, views: &[RenderView], scene: &Scene) {
        let frame_id = self.frame_id;
        let Self {
            gl,
            settings,
            use_vao,
            programs,
            textures,
            materials,
            primitives,
            buckets,
            mask_resets,
            camera_positions,
            stats,
            ..
        } = self;
        let gl: &mut dyn GlContext = gl;

        let mut current_program: Option<ProgramId> = None;
        let mut program_usable = false;
        let mut current_material: Option<RenderMaterialId> = None;
        let mut attribute_mask: Option<AttributeMask> = None;

        for &primitive_id in &buckets[bucket] {
            let primitive = &mut primitives[primitive_id.index()];
            if primitive.active_frame_id != frame_id {
                continue;
            }
            let material_id = primitive.material();
            let program_id = materials[material_id.index()].program();

            if current_program != Some(program_id) {
                current_program = Some(program_id);
                program_usable = programs.get_mut(program_id).use_program(gl);
                if program_usable {
                    stats.program_binds += 1;
                    let program = programs.get(program_id);
                    set_light_uniforms(gl, program, settings);
                    if let [view] = views {
                        set_view_uniforms(gl, program, view, camera_positions[0]);
                    }
                }
            }
            if !program_usable {
                continue;
            }
            let program = programs.get(program_id);

            if current_material != Some(material_id) {
                let previous = current_material.map(|id| materials[id.index()].state());
                let material = &mut materials[material_id.index()];
                bind_material_state(gl, material.state(), previous, mask_resets);
                material.bind(gl, program, textures);
                current_material = Some(material_id);
                stats.material_binds += 1;
            }

            primitive.bind_vertex_input(gl, *use_vao, &mut attribute_mask);

            let model_location = program.uniform(MODEL_MATRIX);
            for (view, &camera_position) in views.iter().zip(camera_positions.iter()) {
                if views.len() > 1 {
                    if let Some(viewport) = view.viewport {
                        gl.viewport(viewport);
                    }
                    set_view_uniforms(gl, program, view, camera_position);
                }

                for &node_handle in primitive.instances() {
                    let Some(node) = scene.get(node_handle) else {
                        continue;
                    };
                    if node.active_frame_id != frame_id {
                        continue;
                    }
                    if let Some(location) = model_location {
                        gl.uniform_matrix4fv(location, &node.transform.world_matrix_as_mat4().to_cols_array());
                    }
                    primitive.draw(gl);
                    stats.draw_calls += 1;
                }
            }
        }
    }

    fn poll_resources(&mut self) {
        let gl: &mut dyn GlContext = &mut self.gl;
        self.pending_buffers
            .retain(|buffer| upload_buffer(gl, buffer) == Readiness::Pending);
        self.textures.poll_pending(gl, self.frame_id);
    }
}

fn set_light_uniforms(gl: &mut dyn GlContext, program: &Program, settings: &RendererSettings) {
    if let Some(location) = program.uniform(LIGHT_DIRECTION) {
        gl.uniform_fv(location, 3, &settings.light_direction);
    }
    if let Some(location) = program.uniform(LIGHT_COLOR) {
        gl.uniform_fv(location, 3, &settings.light_color);
    }
}

fn set_view_uniforms(gl: &mut dyn GlContext, program: &Program, view: &RenderView, camera_position: Vec3) {
    if let Some(location) = program.uniform(PROJECTION_MATRIX) {
        gl.uniform_matrix4fv(location, &view.projection.to_cols_array());
    }
    if let Some(location) = program.uniform(VIEW_MATRIX) {
        gl.uniform_matrix4fv(location, &view.view_matrix.to_cols_array());
    }
    if let Some(location) = program.uniform(CAMERA_POSITION) {
        gl.uniform_fv(location, 3, &camera_position.to_array());
    }
    if let Some(location) = program.uniform(EYE_INDEX) {
        gl.uniform_1i(location, view.eye_index());
    }
}

fn write_buffer(
    gl: &mut dyn GlContext,
    target: BufferTarget,
    usage: BufferUsage,
    byte_length: &mut usize,
    offset: usize,
    data: &[u8],
) {
    if offset == 0 && data.len() >= *byte_length {
        gl.buffer_data(target, data, usage);
        *byte_length = data.len();
    } else if offset + data.len() > *byte_length {
        log::warn!(
            "Dropping {} byte write at offset {offset}: past the {} byte buffer store",
            data.len(),
            *byte_length
        );
    } else {
        gl.buffer_sub_data(target, offset, data);
    }
}

/// Uploads `buffer` once its source has settled.
fn upload_buffer(gl: &mut dyn GlContext, buffer: &GeometryBuffer) -> Readiness {
    let (target, usage) = (buffer.target(), buffer.usage());
    buffer.with_state(|state| {
        let Some(source) = state.source.as_mut() else {
            return if state.failed { Readiness::Failed } else { Readiness::Ready };
        };
        match source.poll() {
            Readiness::Pending => Readiness::Pending,
            Readiness::Failed => {
                if let Some(error) = source.error() {
                    log::warn!("Buffer {} data failed to load: {error}", buffer.id());
                }
                state.source = None;
                state.failed = true;
                state.deferred_writes.clear();
                Readiness::Failed
            }
            Readiness::Ready => {
                let bytes = source.take().unwrap_or_default();
                state.source = None;

                let handle = gl.create_buffer();
                gl.bind_buffer(target, Some(handle));
                gl.buffer_data(target, &bytes, usage);
                state.byte_length = bytes.len();
                state.handle = Some(handle);

                for (offset, data) in std::mem::take(&mut state.deferred_writes) {
                    write_buffer(gl, target, usage, &mut state.byte_length, offset, &data);
                }
                Readiness::Ready
            }
        }
    })
}
