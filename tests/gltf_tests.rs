//! glTF Loading Tests
//!
//! Tests for:
//! - Embedded (data URI) and GLB binary buffers
//! - External buffers and images read through an asset reader
//! - Texture keys of embedded images across documents
//! - Material translation (alpha mode, double sided, base color)
//! - Node hierarchy and transforms
//! - Rejection of unsupported documents

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use glam::{Mat4, Vec3};
use serde_json::{Value, json};
use view360::renderer::{GlCall, HeadlessContext, RenderView, Renderer};
use view360::resources::RenderOrder;
use view360::{AssetReader, GltfLoader, MemoryAssetReader, Scene, View360Error};

// ============================================================================
// Helpers
// ============================================================================

/// One triangle: 3 float positions followed by 3 u16 indices (padded).
fn triangle_bytes() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 4] = [0, 1, 2, 0];
    let mut bytes = bytemuck::cast_slice(&positions).to_vec();
    bytes.extend_from_slice(bytemuck::cast_slice(&indices));
    bytes
}

fn data_uri(bytes: &[u8]) -> String {
    format!("data:application/octet-stream;base64,{}", STANDARD.encode(bytes))
}

/// A document with one indexed triangle mesh on one node.
fn triangle_document(buffer: Value, material: Option<Value>) -> Value {
    let mut primitive = json!({
        "attributes": { "POSITION": 0 },
        "indices": 1
    });
    let mut doc = json!({
        "asset": { "version": "2.0" },
        "buffers": [buffer],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "meshes": [{ "primitives": [] }],
        "nodes": [{ "name": "triangle", "mesh": 0 }],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    });
    if let Some(material) = material {
        primitive["material"] = json!(0);
        doc["materials"] = json!([material]);
    }
    doc["meshes"][0]["primitives"] = json!([primitive]);
    doc
}

fn embedded_triangle(material: Option<Value>) -> Vec<u8> {
    let buffer = json!({ "byteLength": 42, "uri": data_uri(&triangle_bytes()) });
    serde_json::to_vec(&triangle_document(buffer, material)).unwrap()
}

fn setup(reader: Arc<dyn AssetReader>) -> (Renderer<HeadlessContext>, Scene, GltfLoader) {
    let _ = env_logger::builder().is_test(true).try_init();
    (Renderer::new(HeadlessContext::new()), Scene::new(), GltfLoader::new(reader))
}

fn view() -> RenderView {
    RenderView::new(Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0), Mat4::IDENTITY)
}

fn draw(renderer: &mut Renderer<HeadlessContext>, scene: &mut Scene) -> Vec<GlCall> {
    renderer.context_mut().clear_calls();
    renderer.draw_scene(&[view()], scene);
    renderer.context().calls().to_vec()
}

/// Draws until a frame issues `expected` draw calls, or gives up.
fn draw_until(renderer: &mut Renderer<HeadlessContext>, scene: &mut Scene, expected: usize) -> Vec<GlCall> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let calls = draw(renderer, scene);
        let draws = calls.iter().filter(|c| c.is_draw()).count();
        if draws == expected || Instant::now() > deadline {
            return calls;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Packs a JSON document and a binary chunk into a GLB container.
fn glb(json: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json_chunk = serde_json::to_vec(json).unwrap();
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }
    let mut bin_chunk = bin.to_vec();
    while bin_chunk.len() % 4 != 0 {
        bin_chunk.push(0);
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin_chunk.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json_chunk);
    out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin_chunk);
    out
}

// ============================================================================
// Embedded documents
// ============================================================================

#[test]
fn embedded_triangle_draws_immediately() -> anyhow::Result<()> {
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    let root = loader.load_from_slice(&embedded_triangle(None), &mut renderer, &mut scene)?;

    assert_eq!(scene.get(root).unwrap().name.as_deref(), Some("gltf"));
    let triangle = scene.find_by_name("triangle").unwrap();
    assert_eq!(scene.get(triangle).unwrap().parent(), Some(root));
    assert_eq!(scene.get(triangle).unwrap().render_primitives().len(), 1);

    let calls = draw(&mut renderer, &mut scene);
    assert!(calls.iter().any(|c| matches!(c, GlCall::DrawElements { count: 3, .. })));
    Ok(())
}

#[test]
fn blended_double_sided_material_is_transparent_without_culling() {
    let material = json!({
        "alphaMode": "BLEND",
        "doubleSided": true,
        "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.25, 0.5] }
    });
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader
        .load_from_slice(&embedded_triangle(Some(material)), &mut renderer, &mut scene)
        .unwrap();

    assert_eq!(renderer.bucket(RenderOrder::Transparent).len(), 1);
    assert!(renderer.bucket(RenderOrder::Opaque).is_empty());

    let id = renderer.bucket(RenderOrder::Transparent)[0];
    let material_id = renderer.render_primitive(id).material();
    let state = renderer.render_material(material_id).state();
    assert!(state.blend());
    assert!(!state.cull_face());

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 1);
    assert_eq!(
        renderer.context().last_uniform_values("baseColorFactor"),
        Some(&[1.0, 0.5, 0.25, 0.5][..])
    );
}

#[test]
fn primitives_without_material_share_a_default() {
    let buffer = json!({ "byteLength": 42, "uri": data_uri(&triangle_bytes()) });
    let mut doc = triangle_document(buffer, None);
    let primitive = doc["meshes"][0]["primitives"][0].clone();
    doc["meshes"][0]["primitives"] = json!([primitive.clone(), primitive]);

    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader
        .load_from_slice(&serde_json::to_vec(&doc).unwrap(), &mut renderer, &mut scene)
        .unwrap();

    assert_eq!(renderer.render_primitive_count(), 2);
    assert_eq!(renderer.render_material_count(), 1);
}

#[test]
fn node_transforms_and_hierarchy_are_kept() {
    let buffer = json!({ "byteLength": 42, "uri": data_uri(&triangle_bytes()) });
    let mut doc = triangle_document(buffer, None);
    doc["nodes"] = json!([
        { "name": "parent", "translation": [0.0, 2.0, 0.0], "children": [1] },
        {
            "name": "child",
            "mesh": 0,
            "matrix": [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 3.0, 0.0, 0.0, 1.0]
        }
    ]);

    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader
        .load_from_slice(&serde_json::to_vec(&doc).unwrap(), &mut renderer, &mut scene)
        .unwrap();

    let parent = scene.find_by_name("parent").unwrap();
    let child = scene.find_by_name("child").unwrap();
    assert_eq!(scene.get(child).unwrap().parent(), Some(parent));

    let world = scene.compute_world_matrix(child).unwrap();
    let origin = world.transform_point3(Vec3::ZERO);
    assert!((origin - Vec3::new(3.0, 2.0, 0.0)).length() < 1e-5);
}

#[test]
fn glb_binary_chunk_is_used() {
    let doc = triangle_document(json!({ "byteLength": 42 }), None);
    let bytes = glb(&doc, &triangle_bytes());

    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader.load_from_slice(&bytes, &mut renderer, &mut scene).unwrap();

    let calls = draw(&mut renderer, &mut scene);
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 1);
}

/// A GLB whose triangle samples a PNG stored in the binary chunk.
fn textured_glb(png: &[u8]) -> Vec<u8> {
    let mut bin = triangle_bytes();
    bin.extend_from_slice(&[0, 0]);
    let image_offset = bin.len();
    bin.extend_from_slice(png);

    let material = json!({ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } });
    let mut doc = triangle_document(json!({ "byteLength": bin.len() }), Some(material));
    doc["bufferViews"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "buffer": 0, "byteOffset": image_offset, "byteLength": png.len() }));
    doc["images"] = json!([{ "bufferView": 2, "mimeType": "image/png" }]);
    doc["textures"] = json!([{ "source": 0 }]);
    glb(&doc, &bin)
}

#[test]
fn embedded_images_of_different_documents_stay_distinct() {
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader
        .load_from_slice(&textured_glb(&png_bytes(2, 2)), &mut renderer, &mut scene)
        .unwrap();
    loader
        .load_from_slice(&textured_glb(&png_bytes(4, 4)), &mut renderer, &mut scene)
        .unwrap();
    assert_eq!(renderer.textures().len(), 2);

    let calls = draw_until(&mut renderer, &mut scene, 2);
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 2);
}

#[test]
fn identical_embedded_images_share_a_texture() {
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    let bytes = textured_glb(&png_bytes(2, 2));
    loader.load_from_slice(&bytes, &mut renderer, &mut scene).unwrap();
    loader.load_from_slice(&bytes, &mut renderer, &mut scene).unwrap();
    assert_eq!(renderer.textures().len(), 1);
}

// ============================================================================
// External resources
// ============================================================================

#[test]
fn external_buffer_draws_once_read() {
    let reader = Arc::new(MemoryAssetReader::new());
    reader.insert("models/triangle.bin", triangle_bytes());
    reader.insert(
        "models/triangle.gltf",
        serde_json::to_vec(&triangle_document(
            json!({ "byteLength": 42, "uri": "triangle.bin" }),
            None,
        ))
        .unwrap(),
    );

    let (mut renderer, mut scene, loader) = setup(reader);
    loader
        .load_from_path("models/triangle.gltf", &mut renderer, &mut scene)
        .unwrap();

    let calls = draw_until(&mut renderer, &mut scene, 1);
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 1);
}

#[test]
fn missing_external_buffer_never_draws() {
    let doc = triangle_document(json!({ "byteLength": 42, "uri": "missing.bin" }), None);
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    loader
        .load_from_slice(&serde_json::to_vec(&doc).unwrap(), &mut renderer, &mut scene)
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    for _ in 0..3 {
        let calls = draw(&mut renderer, &mut scene);
        assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 0);
    }
}

#[test]
fn external_image_texture_uploads_when_decoded() {
    let reader = Arc::new(MemoryAssetReader::new());
    reader.insert("red.png", png_bytes(4, 4));

    let buffer = json!({ "byteLength": 42, "uri": data_uri(&triangle_bytes()) });
    let material = json!({ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } });
    let mut doc = triangle_document(buffer, Some(material));
    doc["images"] = json!([{ "uri": "red.png" }]);
    doc["textures"] = json!([{ "source": 0 }]);

    let (mut renderer, mut scene, loader) = setup(reader);
    loader
        .load_from_slice(&serde_json::to_vec(&doc).unwrap(), &mut renderer, &mut scene)
        .unwrap();
    assert_eq!(renderer.textures().len(), 1);

    let calls = draw_until(&mut renderer, &mut scene, 1);
    assert_eq!(calls.iter().filter(|c| c.is_draw()).count(), 1);
    assert_eq!(renderer.textures().pending_count(), 0);
}

// ============================================================================
// Rejection
// ============================================================================

#[test]
fn gltf_1_documents_are_rejected() {
    let doc = json!({ "asset": { "version": "1.0" } });
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    let result = loader.load_from_slice(&serde_json::to_vec(&doc).unwrap(), &mut renderer, &mut scene);
    assert!(matches!(result, Err(View360Error::UnsupportedAsset(_))));
    assert_eq!(scene.len(), 1);
}

#[test]
fn malformed_documents_are_errors() {
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    let result = loader.load_from_slice(b"not a gltf", &mut renderer, &mut scene);
    assert!(matches!(result, Err(View360Error::GltfError(_))));
}

#[test]
fn missing_document_is_not_found() {
    let (mut renderer, mut scene, loader) = setup(Arc::new(MemoryAssetReader::new()));
    let result = loader.load_from_path("nowhere.gltf", &mut renderer, &mut scene);
    assert!(matches!(result, Err(View360Error::AssetNotFound(_))));
}
