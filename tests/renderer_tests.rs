//! Renderer Integration Tests
//!
//! Tests for:
//! - Program and render material sharing
//! - Bucketed draw order and skipped (invisible, incomplete, failed) work
//! - Buffer uploads, deferred writes, overflowing writes and pending data
//! - Texture readiness gating draws
//! - Stereo views, vertex input binding with and without VAOs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use glam::{Mat4, Vec3};
use view360::core::completion_pair;
use view360::renderer::gl::{
    BufferTarget, BufferUsage, Capability, ComponentType, IndexType, PixelFormat, Topology,
    Viewport,
};
use view360::renderer::{Eye, GlCall, HeadlessContext, RenderView, Renderer};
use view360::resources::material::BASE_COLOR_TEXTURE;
use view360::resources::{
    AttributeSemantic, BufferSource, CustomShader, DecodedImage, GeometryBuffer, Material,
    Primitive, PrimitiveAttribute, RenderOrder, Texture, VideoSource,
};
use view360::scene::{Node, Scene, StereoLayout, create_skybox};
use view360::View360Error;

// ============================================================================
// Helpers
// ============================================================================

const QUAD_VERTICES: [f32; 20] = [
    -1.0, -1.0, 0.0, 0.0, 0.0, //
    1.0, -1.0, 0.0, 1.0, 0.0, //
    1.0, 1.0, 0.0, 1.0, 1.0, //
    -1.0, 1.0, 0.0, 0.0, 1.0,
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

fn quad_from(vertex_buffer: GeometryBuffer, index_buffer: GeometryBuffer) -> Primitive {
    let attributes = vec![
        PrimitiveAttribute::new(AttributeSemantic::Position, vertex_buffer.clone(), 3, ComponentType::Float, 20, 0),
        PrimitiveAttribute::new(AttributeSemantic::TexCoord0, vertex_buffer, 2, ComponentType::Float, 20, 12),
    ];
    let mut primitive = Primitive::new(attributes, 6, Topology::Triangles);
    primitive.set_indices(index_buffer, IndexType::UnsignedShort, 0);
    primitive.set_bounds(Vec3::new(-1.0, -1.0, -0.1), Vec3::new(1.0, 1.0, 0.1));
    primitive
}

fn quad(renderer: &mut Renderer<HeadlessContext>) -> Primitive {
    let vertices = renderer.create_buffer(
        BufferTarget::Array,
        BufferSource::from_slice(&QUAD_VERTICES),
        BufferUsage::Static,
    );
    let indices = renderer.create_buffer(
        BufferTarget::ElementArray,
        BufferSource::from_slice(&QUAD_INDICES),
        BufferUsage::Static,
    );
    quad_from(vertices, indices)
}

fn mono_view() -> RenderView {
    RenderView::new(Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0), Mat4::IDENTITY)
}

fn new_renderer() -> Renderer<HeadlessContext> {
    Renderer::new(HeadlessContext::new())
}

fn draw(renderer: &mut Renderer<HeadlessContext>, scene: &mut Scene) -> Vec<GlCall> {
    renderer.context_mut().clear_calls();
    renderer.draw_scene(&[mono_view()], scene);
    renderer.context().calls().to_vec()
}

fn draws(calls: &[GlCall]) -> usize {
    calls.iter().filter(|c| c.is_draw()).count()
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn primitives_sharing_a_material_share_program_and_render_material() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let material = Material::standard();

    let a = quad(&mut renderer);
    let b = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &a, &material).unwrap();
    renderer.create_mesh(&mut scene, root, &b, &material).unwrap();

    assert_eq!(renderer.program_count(), 1);
    assert_eq!(renderer.render_material_count(), 1);

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 2);
    let stats = renderer.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.program_binds, 1);
    assert_eq!(stats.material_binds, 1);
}

#[test]
fn cloned_material_gets_its_own_render_material() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let opaque = Material::standard();
    let mut blended = opaque.clone();
    blended.state.set_blend(true);

    let a = quad(&mut renderer);
    let b = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &a, &opaque).unwrap();
    renderer.create_mesh(&mut scene, root, &b, &blended).unwrap();

    assert_eq!(renderer.program_count(), 1);
    assert_eq!(renderer.render_material_count(), 2);
    assert_eq!(renderer.bucket(RenderOrder::Opaque).len(), 1);
    assert_eq!(renderer.bucket(RenderOrder::Transparent).len(), 1);
    assert_eq!(renderer.bucket(RenderOrder::Default).len(), 1);

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 2);
    assert!(calls.contains(&GlCall::Enable(Capability::Blend)));
}

#[test]
fn one_primitive_instanced_by_two_nodes_draws_twice() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let primitive = quad(&mut renderer);
    let id = renderer.create_render_primitive(&primitive, &Material::standard()).unwrap();

    let root = scene.root();
    let a = scene.add_node(root, Node::new());
    let b = scene.add_node(root, Node::new());
    renderer.attach_render_primitive(&mut scene, a, id);
    renderer.attach_render_primitive(&mut scene, b, id);

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 2);
    assert_eq!(renderer.render_primitive(id).instances().len(), 2);

    renderer.remove_node(&mut scene, a);
    assert_eq!(renderer.render_primitive(id).instances(), &[b]);
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 1);
}

#[test]
fn model_matrix_follows_node_transform() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let primitive = quad(&mut renderer);
    let root = scene.root();
    let node = renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();
    scene.get_mut(node).unwrap().transform.position = Vec3::new(0.0, 0.0, -3.0);

    draw(&mut renderer, &mut scene);
    renderer.context_mut().clear_calls();
    renderer.draw_scene(&[mono_view()], &mut scene);

    let model = renderer.context().last_uniform_values("MODEL_MATRIX").unwrap();
    assert_eq!(&model[12..15], &[0.0, 0.0, -3.0]);
}

// ============================================================================
// Draw order and skipping
// ============================================================================

#[test]
fn buckets_draw_opaque_then_sky_then_transparent() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();

    // Created in reverse of the expected draw order.
    let mut transparent = Material::standard();
    transparent.state.set_blend(true);
    let primitive = quad(&mut renderer);
    renderer.create_mesh(&mut scene, root, &primitive, &transparent).unwrap();

    create_skybox(
        &mut renderer,
        &mut scene,
        root,
        Arc::new(Texture::color(0, 0, 255, 255)),
        StereoLayout::Mono,
        0.0,
    )
    .unwrap();

    let primitive = quad(&mut renderer);
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();

    assert_eq!(renderer.bucket(RenderOrder::Opaque).len(), 1);
    assert_eq!(renderer.bucket(RenderOrder::Sky).len(), 1);
    assert_eq!(renderer.bucket(RenderOrder::Transparent).len(), 1);

    let calls = draw(&mut renderer, &mut scene);
    let draw_positions: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_draw())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(draw_positions.len(), 3);

    let sky_mask = calls.iter().position(|c| *c == GlCall::DepthMask(false)).unwrap();
    let blend_on = calls
        .iter()
        .position(|c| *c == GlCall::Enable(Capability::Blend))
        .unwrap();
    assert!(draw_positions[0] < sky_mask);
    assert!(sky_mask < draw_positions[1]);
    assert!(draw_positions[1] < blend_on);
    assert!(blend_on < draw_positions[2]);

    // The sky disabled depth writes; the frame hands depth writes back on.
    let last_depth_mask = calls
        .iter()
        .rev()
        .find(|c| matches!(c, GlCall::DepthMask(_)))
        .unwrap();
    assert_eq!(*last_depth_mask, GlCall::DepthMask(true));
}

#[test]
fn invisible_subtrees_are_not_drawn() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.add_node(root, Node::with_name("group"));
    let primitive = quad(&mut renderer);
    let mesh = renderer.create_mesh(&mut scene, group, &primitive, &Material::standard()).unwrap();

    scene.get_mut(group).unwrap().visible = false;
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);
    assert_eq!(renderer.stats().active_primitives, 0);

    scene.get_mut(group).unwrap().visible = true;
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 1);
    assert_eq!(scene.get(mesh).unwrap().active_frame_id(), renderer.frame_id());
}

#[test]
fn draw_views_with_stale_root_does_nothing() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();
    let gone = scene.add_node(root, Node::new());
    scene.remove_node(gone);

    renderer.context_mut().clear_calls();
    renderer.draw_views(&[mono_view()], &mut scene, gone);
    assert!(renderer.context().calls().is_empty());
    assert_eq!(renderer.frame_id(), 0);
}

#[test]
fn failed_program_is_skipped() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let material = Material::custom(CustomShader {
        name: "BROKEN".to_string(),
        vertex_source: "attribute vec3 POSITION;\nvec4 vertex_main(mat4 p, mat4 v, mat4 m) { return vec4(POSITION, 1.0); }\n".to_string(),
        fragment_source: "#error does not compile\nvec4 fragment_main() { return vec4(1.0); }\n".to_string(),
        defines: Default::default(),
    });
    let primitive = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &material).unwrap();

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);
    assert_eq!(renderer.context().live_program_count(), 0);

    // Still skipped on later frames, without touching GL program state.
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);
    assert!(!calls.iter().any(|c| matches!(c, GlCall::UseProgram(_))));
}

#[test]
fn material_without_shader_source_is_an_error() {
    let mut renderer = new_renderer();
    let material = Material::custom(CustomShader {
        name: "EMPTY".to_string(),
        ..Default::default()
    });
    let primitive = quad(&mut renderer);
    let result = renderer.create_render_primitive(&primitive, &material);
    assert!(matches!(result, Err(View360Error::MissingShaderSource { stage: "vertex", .. })));
}

// ============================================================================
// State diffing across materials
// ============================================================================

#[test]
fn identical_states_are_not_rebound() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();
    for _ in 0..2 {
        let primitive = quad(&mut renderer);
        renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();
    }
    assert_eq!(renderer.render_material_count(), 2);

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(renderer.stats().material_binds, 2);
    assert_eq!(
        calls.iter().filter(|c| **c == GlCall::Enable(Capability::CullFace)).count(),
        1
    );
}

#[test]
fn double_sided_material_toggles_culling() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();
    let primitive = quad(&mut renderer);
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();
    let mut double_sided = Material::standard();
    double_sided.state.set_cull_face(false);
    let primitive = quad(&mut renderer);
    renderer.create_mesh(&mut scene, root, &primitive, &double_sided).unwrap();

    let calls = draw(&mut renderer, &mut scene);
    let enable = calls.iter().position(|c| *c == GlCall::Enable(Capability::CullFace)).unwrap();
    let disable = calls.iter().position(|c| *c == GlCall::Disable(Capability::CullFace)).unwrap();
    assert!(enable < disable);
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn pending_buffer_defers_draw_until_ready() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let (completer, completion) = completion_pair();
    let vertices = renderer.create_buffer(BufferTarget::Array, completion, BufferUsage::Static);
    let indices = renderer.create_buffer(
        BufferTarget::ElementArray,
        BufferSource::from_slice(&QUAD_INDICES),
        BufferUsage::Static,
    );
    assert!(!vertices.is_ready());

    let primitive = quad_from(vertices.clone(), indices);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);

    completer.complete(bytemuck::cast_slice(&QUAD_VERTICES).to_vec());
    let calls = draw(&mut renderer, &mut scene);
    assert!(vertices.is_ready());
    assert!(calls.contains(&GlCall::BufferData {
        target: BufferTarget::Array,
        len: 80,
        usage: BufferUsage::Static
    }));
    assert_eq!(draws(&calls), 1);
}

#[test]
fn failed_buffer_never_draws() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let (completer, completion) = completion_pair::<Vec<u8>>();
    let vertices = renderer.create_buffer(BufferTarget::Array, completion, BufferUsage::Static);
    let indices = renderer.create_buffer(
        BufferTarget::ElementArray,
        BufferSource::from_slice(&QUAD_INDICES),
        BufferUsage::Static,
    );
    let primitive = quad_from(vertices.clone(), indices);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();

    completer.fail(View360Error::AssetNotFound("quad.bin".to_string()));
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);
    assert!(vertices.is_failed());
}

#[test]
fn update_buffer_replaces_or_patches() {
    let mut renderer = new_renderer();
    let buffer = renderer.create_buffer(BufferTarget::Array, vec![0u8; 16], BufferUsage::Dynamic);

    renderer.context_mut().clear_calls();
    renderer.update_buffer(&buffer, &[1u8; 16], 0);
    renderer.update_buffer(&buffer, &[2u8; 4], 8);
    renderer.update_buffer(&buffer, &[3u8; 32], 0);

    let calls = renderer.context().calls();
    assert!(calls.contains(&GlCall::BufferData {
        target: BufferTarget::Array,
        len: 16,
        usage: BufferUsage::Dynamic
    }));
    assert!(calls.contains(&GlCall::BufferSubData {
        target: BufferTarget::Array,
        offset: 8,
        len: 4
    }));
    assert!(calls.contains(&GlCall::BufferData {
        target: BufferTarget::Array,
        len: 32,
        usage: BufferUsage::Dynamic
    }));
    assert_eq!(buffer.byte_length(), 32);
}

#[test]
fn write_past_the_store_is_dropped() {
    let mut renderer = new_renderer();
    let buffer = renderer.create_buffer(BufferTarget::Array, vec![0u8; 16], BufferUsage::Dynamic);

    renderer.context_mut().clear_calls();
    renderer.update_buffer(&buffer, &[4u8; 16], 8);
    renderer.update_buffer(&buffer, &[5u8; 8], 8);

    let calls = renderer.context().calls();
    assert!(!calls.iter().any(|c| matches!(c, GlCall::BufferData { .. })));
    let patches: Vec<&GlCall> = calls
        .iter()
        .filter(|c| matches!(c, GlCall::BufferSubData { .. }))
        .collect();
    assert_eq!(
        patches,
        vec![&GlCall::BufferSubData {
            target: BufferTarget::Array,
            offset: 8,
            len: 8
        }]
    );
    assert_eq!(buffer.byte_length(), 16);
}

#[test]
fn writes_to_pending_buffer_apply_after_upload() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let (completer, completion) = completion_pair();
    let buffer = renderer.create_buffer(BufferTarget::Array, completion, BufferUsage::Dynamic);

    renderer.update_buffer(&buffer, &[9u8; 4], 4);
    completer.complete(vec![0u8; 16]);

    renderer.context_mut().clear_calls();
    renderer.draw_scene(&[mono_view()], &mut scene);
    let calls = renderer.context().calls();
    let data = calls
        .iter()
        .position(|c| matches!(c, GlCall::BufferData { len: 16, .. }))
        .unwrap();
    let patch = calls
        .iter()
        .position(|c| matches!(c, GlCall::BufferSubData { offset: 4, len: 4, .. }))
        .unwrap();
    assert!(data < patch);
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn empty_texture_key_is_an_error() {
    let mut renderer = new_renderer();
    let texture = Arc::new(Texture::from_image("", view360::Completion::failed(View360Error::Abandoned)));
    assert!(matches!(renderer.texture(&texture), Err(View360Error::MissingTextureKey)));
}

#[test]
fn textures_with_the_same_key_share_a_render_texture() {
    let mut renderer = new_renderer();
    let a = renderer.texture(&Arc::new(Texture::color(1, 2, 3, 4))).unwrap();
    let b = renderer.texture(&Arc::new(Texture::color(1, 2, 3, 4))).unwrap();
    assert_eq!(a, b);
    assert_eq!(renderer.textures().len(), 1);
}

#[test]
fn pending_image_gates_the_primitive() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let (completer, completion) = completion_pair();
    let texture = Arc::new(Texture::from_image("pano.png", completion));

    let mut material = Material::standard();
    material.set_texture(BASE_COLOR_TEXTURE, Some(texture));
    let primitive = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &material).unwrap();
    assert_eq!(renderer.textures().pending_count(), 1);

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);

    completer.complete(DecodedImage {
        width: 2,
        height: 2,
        format: PixelFormat::Rgba,
        pixels: vec![255; 16],
    });
    let calls = draw(&mut renderer, &mut scene);
    assert!(calls.iter().any(|c| matches!(c, GlCall::TexImage2D { width: 2, height: 2, .. })));
    assert!(calls.contains(&GlCall::GenerateMipmap));
    assert_eq!(draws(&calls), 1);
    assert_eq!(renderer.textures().pending_count(), 0);
}

struct FakeVideo {
    ready: AtomicBool,
    playing: AtomicBool,
    frames_read: AtomicUsize,
}

impl FakeVideo {
    fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            playing: AtomicBool::new(true),
            frames_read: AtomicUsize::new(0),
        }
    }
}

impl VideoSource for FakeVideo {
    fn width(&self) -> u32 {
        4
    }
    fn height(&self) -> u32 {
        2
    }
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
    fn is_stalled(&self) -> bool {
        false
    }
    fn with_frame(&self, f: &mut dyn FnMut(&[u8])) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
        f(&[0u8; 32]);
    }
}

#[test]
fn playing_video_uploads_once_per_frame() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let video = Arc::new(FakeVideo::new(true));
    let texture = Arc::new(Texture::video("video-1", video.clone()));

    let mut material = Material::standard();
    material.set_texture(BASE_COLOR_TEXTURE, Some(texture));
    let root = scene.root();
    // Two primitives, one material: still one upload per frame.
    for _ in 0..2 {
        let primitive = quad(&mut renderer);
        renderer.create_mesh(&mut scene, root, &primitive, &material).unwrap();
    }

    draw(&mut renderer, &mut scene);
    let after_first = video.frames_read.load(Ordering::Relaxed);
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(video.frames_read.load(Ordering::Relaxed), after_first + 1);
    assert_eq!(
        calls.iter().filter(|c| matches!(c, GlCall::TexImage2D { .. })).count(),
        1
    );

    video.playing.store(false, Ordering::Relaxed);
    let calls = draw(&mut renderer, &mut scene);
    assert!(!calls.iter().any(|c| matches!(c, GlCall::TexImage2D { .. })));
    assert_eq!(draws(&calls), 2);
}

#[test]
fn video_becoming_ready_uploads_once_on_its_first_frame() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let video = Arc::new(FakeVideo::new(false));
    let texture = Arc::new(Texture::video("video-2", video.clone()));

    let mut material = Material::standard();
    material.set_texture(BASE_COLOR_TEXTURE, Some(texture));
    let primitive = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &material).unwrap();

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 0);
    assert_eq!(video.frames_read.load(Ordering::Relaxed), 0);

    video.ready.store(true, Ordering::Relaxed);
    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(draws(&calls), 1);
    assert_eq!(video.frames_read.load(Ordering::Relaxed), 1);
    assert_eq!(
        calls.iter().filter(|c| matches!(c, GlCall::TexImage2D { .. })).count(),
        1
    );

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(video.frames_read.load(Ordering::Relaxed), 2);
    assert_eq!(draws(&calls), 1);
}

// ============================================================================
// Views and vertex input
// ============================================================================

#[test]
fn stereo_views_draw_each_instance_per_eye() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let root = scene.root();
    create_skybox(
        &mut renderer,
        &mut scene,
        root,
        Arc::new(Texture::color(255, 255, 255, 255)),
        StereoLayout::TopBottom,
        0.0,
    )
    .unwrap();

    let projection = Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0);
    let left = RenderView::new(projection, Mat4::from_translation(Vec3::new(-0.03, 0.0, 0.0)))
        .with_eye(Eye::Left)
        .with_viewport(Viewport::new(0, 0, 512, 512));
    let right = RenderView::new(projection, Mat4::from_translation(Vec3::new(0.03, 0.0, 0.0)))
        .with_eye(Eye::Right)
        .with_viewport(Viewport::new(512, 0, 512, 512));

    renderer.context_mut().clear_calls();
    renderer.draw_scene(&[left, right], &mut scene);
    let calls = renderer.context().calls();

    assert_eq!(renderer.stats().draw_calls, 2);
    let viewports: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            GlCall::Viewport(v) => Some(v.x),
            _ => None,
        })
        .collect();
    assert_eq!(viewports, vec![0, 512]);
    let eyes: Vec<i32> = calls
        .iter()
        .filter_map(|c| match c {
            GlCall::Uniform1i(location, value)
                if renderer.context().uniform_name(*location) == Some("EYE_INDEX") =>
            {
                Some(*value)
            }
            _ => None,
        })
        .collect();
    assert_eq!(eyes, vec![0, 1]);
}

#[test]
fn light_settings_reach_lit_programs() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let buffer = renderer.create_buffer(
        BufferTarget::Array,
        BufferSource::from_slice(&[0.0f32; 18]),
        BufferUsage::Static,
    );
    let primitive = Primitive::new(
        vec![
            PrimitiveAttribute::new(AttributeSemantic::Position, buffer.clone(), 3, ComponentType::Float, 24, 0),
            PrimitiveAttribute::new(AttributeSemantic::Normal, buffer, 3, ComponentType::Float, 24, 12),
        ],
        3,
        Topology::Triangles,
    );
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();
    renderer.set_light_direction([0.0, -1.0, 0.0]);

    draw(&mut renderer, &mut scene);
    let direction = renderer.context().last_uniform_values("LIGHT_DIRECTION");
    assert_eq!(direction, Some(&[0.0, -1.0, 0.0][..]));
    let color = renderer.context().last_uniform_values("LIGHT_COLOR");
    assert_eq!(color, Some(&[3.0, 3.0, 3.0][..]));
}

#[test]
fn without_vaos_attribute_arrays_toggle_only_on_mask_change() {
    let mut renderer = Renderer::new(HeadlessContext::new().with_vertex_array_objects(false));
    assert!(!renderer.uses_vertex_array_objects());
    let mut scene = Scene::new();
    let root = scene.root();
    let material = Material::standard();
    for _ in 0..3 {
        let primitive = quad(&mut renderer);
        renderer.create_mesh(&mut scene, root, &primitive, &material).unwrap();
    }

    let calls = draw(&mut renderer, &mut scene);
    let position_location = AttributeSemantic::Position.location();
    assert_eq!(
        calls
            .iter()
            .filter(|c| **c == GlCall::EnableVertexAttribArray(position_location))
            .count(),
        1
    );
    assert_eq!(
        calls.iter().filter(|c| matches!(c, GlCall::VertexAttribPointer { .. })).count(),
        6
    );
    assert!(!calls.iter().any(|c| matches!(c, GlCall::BindVertexArray(_))));
}

#[test]
fn vaos_record_layout_once() {
    let mut renderer = new_renderer();
    let mut scene = Scene::new();
    let primitive = quad(&mut renderer);
    let root = scene.root();
    renderer.create_mesh(&mut scene, root, &primitive, &Material::standard()).unwrap();

    let first = draw(&mut renderer, &mut scene);
    assert!(first.iter().any(|c| matches!(c, GlCall::CreateVertexArray(_))));
    assert_eq!(first.last(), Some(&GlCall::BindVertexArray(None)));

    let second = draw(&mut renderer, &mut scene);
    assert!(!second.iter().any(|c| matches!(c, GlCall::VertexAttribPointer { .. })));
    assert!(second.iter().any(|c| matches!(c, GlCall::BindVertexArray(Some(_)))));
    assert_eq!(draws(&second), 1);
}
