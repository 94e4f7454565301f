use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Mat4, Vec3};
use view360::renderer::gl::{BufferTarget, BufferUsage, ComponentType, IndexType, Topology};
use view360::renderer::{HeadlessContext, RenderView, Renderer};
use view360::resources::{
    AttributeSemantic, BufferSource, Material, Primitive, PrimitiveAttribute, Texture,
};
use view360::scene::{Node, Pointer, Scene, StereoLayout, create_skybox, hit_test};

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

const QUAD_VERTICES: [f32; 20] = [
    -1.0, -1.0, 0.0, 0.0, 0.0, //
    1.0, -1.0, 0.0, 1.0, 0.0, //
    1.0, 1.0, 0.0, 1.0, 1.0, //
    -1.0, 1.0, 0.0, 0.0, 1.0,
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// A grid of `count` quads spread over `material_count` materials, under a
/// skybox.
fn build_scene(count: usize, material_count: usize) -> (Renderer<HeadlessContext>, Scene) {
    let mut renderer = Renderer::new(HeadlessContext::new());
    let mut scene = Scene::new();
    let root = scene.root();

    create_skybox(
        &mut renderer,
        &mut scene,
        root,
        Arc::new(Texture::color(40, 40, 80, 255)),
        StereoLayout::TopBottom,
        0.0,
    )
    .unwrap();

    let materials: Vec<Material> = (0..material_count)
        .map(|i| {
            let mut material = Material::standard();
            material.state.set_blend(i % 2 == 1);
            material
        })
        .collect();

    let group = scene.add_node(root, Node::with_name("grid"));
    for i in 0..count {
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
        let mut primitive = Primitive::new(
            vec![
                PrimitiveAttribute::new(AttributeSemantic::Position, vertices.clone(), 3, ComponentType::Float, 20, 0),
                PrimitiveAttribute::new(AttributeSemantic::TexCoord0, vertices, 2, ComponentType::Float, 20, 12),
            ],
            6,
            Topology::Triangles,
        );
        primitive.set_indices(indices, IndexType::UnsignedShort, 0);
        primitive.set_bounds(Vec3::new(-1.0, -1.0, -0.1), Vec3::new(1.0, 1.0, 0.1));

        let node = renderer
            .create_mesh(&mut scene, group, &primitive, &materials[i % material_count])
            .unwrap();
        let node = scene.get_mut(node).unwrap();
        node.transform.position = Vec3::new((i % 32) as f32 * 2.5, (i / 32) as f32 * 2.5, -20.0);
        node.selectable = true;
    }
    (renderer, scene)
}

fn stereo_views() -> [RenderView; 2] {
    let projection = Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0);
    [
        RenderView::new(projection, Mat4::from_translation(Vec3::new(-0.03, 0.0, 0.0))),
        RenderView::new(projection, Mat4::from_translation(Vec3::new(0.03, 0.0, 0.0))),
    ]
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

fn bench_draw_mono(c: &mut Criterion) {
    let (mut renderer, mut scene) = build_scene(1024, 8);
    let view = [RenderView::new(Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0), Mat4::IDENTITY)];
    c.bench_function("draw_1024_quads_mono", |b| {
        b.iter(|| {
            renderer.draw_scene(black_box(&view), &mut scene);
            renderer.context_mut().clear_calls();
        });
    });
}

fn bench_draw_stereo(c: &mut Criterion) {
    let (mut renderer, mut scene) = build_scene(1024, 8);
    let views = stereo_views();
    c.bench_function("draw_1024_quads_stereo", |b| {
        b.iter(|| {
            renderer.draw_scene(black_box(&views), &mut scene);
            renderer.context_mut().clear_calls();
        });
    });
}

// ---------------------------------------------------------------------------
// Picking
// ---------------------------------------------------------------------------

fn bench_hit_test(c: &mut Criterion) {
    let (renderer, scene) = build_scene(1024, 8);
    let pointer = Pointer {
        source: 0,
        target_ray: Mat4::from_translation(Vec3::new(20.0, 10.0, 0.0)),
    };
    c.bench_function("hit_test_1024_quads", |b| {
        b.iter(|| black_box(hit_test(&scene, &renderer, &pointer.target_ray)));
    });
}

criterion_group!(benches, bench_draw_mono, bench_draw_stereo, bench_hit_test);
criterion_main!(benches);
