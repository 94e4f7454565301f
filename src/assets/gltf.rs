//! glTF 2.0 loader.
//!
//! Turns a `.gltf` or `.glb` document into render primitives and scene
//! nodes. Geometry embedded in the file (GLB binary chunk or base64 data
//! URIs) is uploaded during the load; external buffers and all images are
//! fetched and decoded on the asset runtime and picked up by the renderer
//! once they arrive.

use std::ops::Range;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use gltf::Gltf;
use tokio::runtime::Runtime;

use crate::assets::image::decode_image;
use crate::assets::io::{AssetReader, asset_runtime, data_uri_key, is_data_uri, parse_data_uri};
use crate::core::{Completer, Completion, completion_pair};
use crate::errors::{Result, View360Error};
use crate::renderer::gl::{BufferTarget, BufferUsage, ComponentType, GlContext, IndexType, Topology};
use crate::renderer::{RenderPrimitiveId, Renderer};
use crate::resources::material::{BASE_COLOR_FACTOR, BASE_COLOR_TEXTURE};
use crate::resources::{
    AttributeSemantic, BufferSource, DecodedImage, GeometryBuffer, MagFilter, Material, MinFilter,
    Primitive, PrimitiveAttribute, Texture, TextureSampler, WrapMode,
};
use crate::scene::{Node, NodeHandle, Scene};

// ============================================================================
// Intermediate data
// ============================================================================

/// Where a glTF buffer's bytes come from.
enum BufferData {
    /// GLB binary chunk or a decoded data URI.
    Embedded(Arc<Vec<u8>>),
    /// Resolved URI of an external file.
    External(String),
}

/// Work waiting on an external buffer.
enum BufferConsumer {
    View {
        range: Range<usize>,
        completer: Completer<Vec<u8>>,
    },
    Image {
        range: Range<usize>,
        completer: Completer<DecodedImage>,
    },
}

struct LoadContext<'a> {
    reader: &'a Arc<dyn AssetReader>,
    runtime: &'a Runtime,
    base: &'a str,
    buffers: Vec<BufferData>,
    /// Consumers per external buffer, by buffer index.
    consumers: Vec<Vec<BufferConsumer>>,
}

impl LoadContext<'_> {
    fn resolve_uri(&self, uri: &str) -> String {
        if uri.contains("://") {
            uri.to_string()
        } else {
            format!("{}{uri}", self.base)
        }
    }

    /// Bytes `range` of buffer `buffer`, now or later.
    fn view_source(&mut self, buffer: usize, range: Range<usize>) -> Result<BufferSource> {
        match self.buffers.get(buffer) {
            Some(BufferData::Embedded(bytes)) => Ok(BufferSource::Ready(slice(bytes, range)?.to_vec())),
            Some(BufferData::External(_)) => {
                let (completer, completion) = completion_pair();
                self.consumers[buffer].push(BufferConsumer::View { range, completer });
                Ok(BufferSource::Pending(completion))
            }
            None => Err(out_of_bounds("buffer", buffer)),
        }
    }

    /// Spawns one read per external buffer that fans the bytes out to
    /// everything waiting on it.
    fn spawn_buffer_reads(&mut self) {
        for (index, consumers) in self.consumers.iter_mut().enumerate() {
            if consumers.is_empty() {
                continue;
            }
            let BufferData::External(uri) = &self.buffers[index] else {
                continue;
            };
            let consumers = std::mem::take(consumers);
            let read = self.reader.read_bytes(uri);
            let uri = uri.clone();
            log::debug!("Fetching glTF buffer '{uri}' for {} consumers", consumers.len());

            self.runtime.spawn(async move {
                let bytes = match read.await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("Failed to read glTF buffer '{uri}': {e}");
                        for consumer in consumers {
                            let error = View360Error::AssetNotFound(format!("{uri}: {e}"));
                            match consumer {
                                BufferConsumer::View { completer, .. } => completer.fail(error),
                                BufferConsumer::Image { completer, .. } => completer.fail(error),
                            }
                        }
                        return;
                    }
                };
                for consumer in consumers {
                    match consumer {
                        BufferConsumer::View { range, completer } => {
                            completer.settle(slice(&bytes, range).map(<[u8]>::to_vec));
                        }
                        BufferConsumer::Image { range, completer } => {
                            let result = match slice(&bytes, range) {
                                Ok(data) => decode_image(data.to_vec()).await,
                                Err(e) => Err(e),
                            };
                            completer.settle(result);
                        }
                    }
                }
            });
        }
    }
}

fn slice(bytes: &[u8], range: Range<usize>) -> Result<&[u8]> {
    let end = range.end;
    bytes.get(range).ok_or(View360Error::AssetIndexOutOfBounds {
        context: "buffer view byte range".to_string(),
        index: end,
    })
}

fn out_of_bounds(context: &str, index: usize) -> View360Error {
    View360Error::AssetIndexOutOfBounds {
        context: context.to_string(),
        index,
    }
}

fn version_supported(document: &gltf::Document) -> bool {
    let asset = &document.as_json().asset;
    asset.version == "2.0" || asset.min_version.as_deref() == Some("2.0")
}

fn sampler_from_gltf(sampler: &gltf::texture::Sampler<'_>) -> TextureSampler {
    use gltf::texture::{MagFilter as GMag, MinFilter as GMin, WrappingMode};

    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        WrappingMode::Repeat => WrapMode::Repeat,
    };
    TextureSampler {
        mag_filter: sampler.mag_filter().map(|f| match f {
            GMag::Nearest => MagFilter::Nearest,
            GMag::Linear => MagFilter::Linear,
        }),
        min_filter: sampler.min_filter().map(|f| match f {
            GMin::Nearest => MinFilter::Nearest,
            GMin::Linear => MinFilter::Linear,
            GMin::NearestMipmapNearest => MinFilter::NearestMipmapNearest,
            GMin::LinearMipmapNearest => MinFilter::LinearMipmapNearest,
            GMin::NearestMipmapLinear => MinFilter::NearestMipmapLinear,
            GMin::LinearMipmapLinear => MinFilter::LinearMipmapLinear,
        }),
        wrap_s: Some(wrap(sampler.wrap_s())),
        wrap_t: Some(wrap(sampler.wrap_t())),
    }
}

fn semantic_from_gltf(semantic: &gltf::Semantic) -> Option<AttributeSemantic> {
    match semantic {
        gltf::Semantic::Positions => Some(AttributeSemantic::Position),
        gltf::Semantic::Normals => Some(AttributeSemantic::Normal),
        gltf::Semantic::Tangents => Some(AttributeSemantic::Tangent),
        gltf::Semantic::TexCoords(0) => Some(AttributeSemantic::TexCoord0),
        gltf::Semantic::TexCoords(1) => Some(AttributeSemantic::TexCoord1),
        gltf::Semantic::Colors(0) => Some(AttributeSemantic::Color0),
        _ => None,
    }
}

fn json_vec3(value: &gltf::json::Value) -> Option<Vec3> {
    let values = value.as_array()?;
    if values.len() < 3 {
        return None;
    }
    let mut out = [0.0f32; 3];
    for (dst, src) in out.iter_mut().zip(values) {
        *dst = src.as_f64()? as f32;
    }
    Some(Vec3::from_array(out))
}

// ============================================================================
// Loader
// ============================================================================

/// Loads glTF 2.0 assets into a renderer and scene.
///
/// External resources are read through the loader's [`AssetReader`],
/// relative to the directory of the document being loaded.
pub struct GltfLoader {
    reader: Arc<dyn AssetReader>,
}

impl GltfLoader {
    pub fn new(reader: Arc<dyn AssetReader>) -> Self {
        Self { reader }
    }

    #[must_use]
    pub fn reader(&self) -> &Arc<dyn AssetReader> {
        &self.reader
    }

    /// Reads `uri` through the asset reader and loads it under the scene
    /// root. Blocks until the document itself has been read.
    pub fn load_from_path<C: GlContext>(
        &self,
        uri: &str,
        renderer: &mut Renderer<C>,
        scene: &mut Scene,
    ) -> Result<NodeHandle> {
        let runtime = asset_runtime()?;
        let bytes = runtime.block_on(self.reader.read_bytes(uri))?;
        let base = uri.rsplit_once('/').map(|(dir, _)| format!("{dir}/")).unwrap_or_default();
        let parent = scene.root();
        self.load(&bytes, &base, renderer, scene, parent)
    }

    /// Loads a `.gltf` (JSON) or `.glb` document under the scene root.
    /// Relative URIs resolve against the reader's root.
    pub fn load_from_slice<C: GlContext>(
        &self,
        bytes: &[u8],
        renderer: &mut Renderer<C>,
        scene: &mut Scene,
    ) -> Result<NodeHandle> {
        let parent = scene.root();
        self.load(bytes, "", renderer, scene, parent)
    }

    /// Loads a document under `parent`. Returns the node holding the
    /// document's scene.
    pub fn load<C: GlContext>(
        &self,
        bytes: &[u8],
        base: &str,
        renderer: &mut Renderer<C>,
        scene: &mut Scene,
        parent: NodeHandle,
    ) -> Result<NodeHandle> {
        let Gltf { document, blob } = Gltf::from_slice(bytes)?;
        if !version_supported(&document) {
            return Err(View360Error::UnsupportedAsset(format!(
                "glTF version {}",
                document.as_json().asset.version
            )));
        }
        if !scene.contains(parent) {
            return Err(View360Error::InvalidHandle("glTF parent node".to_string()));
        }

        let runtime = asset_runtime()?;
        let blob = blob.map(Arc::new);

        let mut ctx = LoadContext {
            reader: &self.reader,
            runtime,
            base,
            buffers: Vec::with_capacity(document.buffers().len()),
            consumers: Vec::new(),
        };
        for buffer in document.buffers() {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => BufferData::Embedded(blob.clone().ok_or_else(|| {
                    View360Error::GltfError("buffer refers to a missing GLB binary chunk".to_string())
                })?),
                gltf::buffer::Source::Uri(uri) if is_data_uri(uri) => {
                    BufferData::Embedded(Arc::new(parse_data_uri(uri)?.data))
                }
                gltf::buffer::Source::Uri(uri) => BufferData::External(ctx.resolve_uri(uri)),
            };
            ctx.buffers.push(data);
        }
        ctx.consumers.resize_with(ctx.buffers.len(), Vec::new);

        let view_buffers = Self::create_view_buffers(&document, &mut ctx, renderer)?;
        let textures = Self::create_textures(&document, &mut ctx)?;
        ctx.spawn_buffer_reads();

        let materials: Vec<Material> = document
            .materials()
            .map(|m| material_from_gltf(&m, &textures))
            .collect();
        let mut default_material: Option<Material> = None;

        let mut meshes: Vec<Vec<RenderPrimitiveId>> = Vec::with_capacity(document.meshes().len());
        for mesh in document.meshes() {
            let mut ids = Vec::new();
            for primitive in mesh.primitives() {
                let Some(built) = build_primitive(&primitive, &view_buffers)? else {
                    continue;
                };
                let material = match primitive.material().index() {
                    Some(index) => materials.get(index).ok_or_else(|| out_of_bounds("material", index))?,
                    None => default_material.get_or_insert_with(Material::standard),
                };
                ids.push(renderer.create_render_primitive(&built, material)?);
            }
            meshes.push(ids);
        }

        let mut root = Node::with_name("gltf");
        root.selectable = false;
        let root = scene.add_node(parent, root);
        let gltf_scene = document.default_scene().or_else(|| document.scenes().next());
        let mut node_count = 0;
        if let Some(gltf_scene) = gltf_scene {
            for node in gltf_scene.nodes() {
                node_count += add_node(&node, root, &meshes, renderer, scene);
            }
        }

        log::debug!(
            "Loaded glTF: {} meshes, {} materials, {} textures, {node_count} nodes",
            meshes.len(),
            materials.len(),
            textures.len()
        );
        Ok(root)
    }

    /// One geometry buffer per buffer view read by a primitive. The target
    /// comes from the first use (index views become element buffers).
    fn create_view_buffers<C: GlContext>(
        document: &gltf::Document,
        ctx: &mut LoadContext<'_>,
        renderer: &mut Renderer<C>,
    ) -> Result<Vec<Option<GeometryBuffer>>> {
        let mut targets: Vec<Option<BufferTarget>> = vec![None; document.views().len()];
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                for (_, accessor) in primitive.attributes() {
                    if let Some(view) = accessor.view() {
                        targets[view.index()].get_or_insert(BufferTarget::Array);
                    }
                }
                if let Some(view) = primitive.indices().and_then(|a| a.view()) {
                    targets[view.index()].get_or_insert(BufferTarget::ElementArray);
                }
            }
        }

        let mut buffers = Vec::with_capacity(targets.len());
        for view in document.views() {
            let Some(target) = targets[view.index()] else {
                buffers.push(None);
                continue;
            };
            let range = view.offset()..view.offset() + view.length();
            let source = ctx.view_source(view.buffer().index(), range)?;
            buffers.push(Some(renderer.create_buffer(target, source, BufferUsage::Static)));
        }
        Ok(buffers)
    }

    /// One texture per referenced image, shared by every glTF texture
    /// sampling that image.
    fn create_textures(
        document: &gltf::Document,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Vec<Arc<Texture>>> {
        let mut by_image: Vec<Option<Arc<Texture>>> = vec![None; document.images().len()];
        let mut textures = Vec::with_capacity(document.textures().len());

        for texture in document.textures() {
            let image = texture.source();
            let slot = by_image
                .get_mut(image.index())
                .ok_or_else(|| out_of_bounds("image", image.index()))?;
            if let Some(existing) = slot {
                textures.push(existing.clone());
                continue;
            }

            let (key, pixels) = Self::load_image(&image, ctx)?;
            let mut created = Texture::from_image(key, pixels);
            // The default sampler has no index; its fields stay derived.
            if texture.sampler().index().is_some() {
                created = created.with_sampler(sampler_from_gltf(&texture.sampler()));
            }
            let created = Arc::new(created);
            *slot = Some(created.clone());
            textures.push(created);
        }
        Ok(textures)
    }

    fn load_image(
        image: &gltf::Image<'_>,
        ctx: &mut LoadContext<'_>,
    ) -> Result<(String, Completion<DecodedImage>)> {
        let (completer, completion) = completion_pair();
        let key = match image.source() {
            gltf::image::Source::Uri { uri, .. } if is_data_uri(uri) => {
                let key = data_uri_key(uri);
                let bytes = parse_data_uri(uri)?.data;
                ctx.runtime
                    .spawn(async move { completer.settle(decode_image(bytes).await) });
                key
            }
            gltf::image::Source::Uri { uri, .. } => {
                let path = ctx.resolve_uri(uri);
                let read = ctx.reader.read_bytes(&path);
                let key = ctx.reader.resolve(&path);
                let label = key.clone();
                ctx.runtime.spawn(async move {
                    let result = match read.await {
                        Ok(bytes) => decode_image(bytes).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &result {
                        log::warn!("Failed to load image '{label}': {e}");
                    }
                    completer.settle(result);
                });
                key
            }
            gltf::image::Source::View { view, .. } => {
                // Keyed by content (or by buffer URI and range) so images of
                // different documents never share a cache entry.
                let range = view.offset()..view.offset() + view.length();
                let buffer = view.buffer().index();
                match ctx.buffers.get(buffer) {
                    Some(BufferData::Embedded(bytes)) => {
                        let bytes = slice(bytes, range)?.to_vec();
                        let key = format!("GLB_IMAGE_{:016x}", xxhash_rust::xxh3::xxh3_64(&bytes));
                        ctx.runtime
                            .spawn(async move { completer.settle(decode_image(bytes).await) });
                        key
                    }
                    Some(BufferData::External(uri)) => {
                        let key = format!("{uri}#{}..{}", range.start, range.end);
                        ctx.consumers[buffer].push(BufferConsumer::Image { range, completer });
                        key
                    }
                    None => return Err(out_of_bounds("buffer", buffer)),
                }
            }
        };
        Ok((key, completion))
    }
}

fn material_from_gltf(material: &gltf::Material<'_>, textures: &[Arc<Texture>]) -> Material {
    let mut out = Material::standard();
    let pbr = material.pbr_metallic_roughness();
    out.set_uniform(BASE_COLOR_FACTOR, &pbr.base_color_factor());
    if let Some(info) = pbr.base_color_texture() {
        let texture = textures.get(info.texture().index()).cloned();
        if texture.is_none() {
            log::warn!("Material references missing texture {}", info.texture().index());
        }
        out.set_texture(BASE_COLOR_TEXTURE, texture);
    }

    // MASK has no cutoff support and falls back to blending.
    out.state.set_blend(!matches!(material.alpha_mode(), gltf::material::AlphaMode::Opaque));
    out.state.set_cull_face(!material.double_sided());
    out
}

/// Builds the engine primitive for a glTF primitive. Primitives without
/// usable attributes are skipped.
fn build_primitive(
    primitive: &gltf::Primitive<'_>,
    view_buffers: &[Option<GeometryBuffer>],
) -> Result<Option<Primitive>> {
    let view_buffer = |accessor: &gltf::Accessor<'_>| -> Result<GeometryBuffer> {
        let view = accessor.view().ok_or_else(|| {
            View360Error::UnsupportedAsset(format!("accessor {} without buffer view", accessor.index()))
        })?;
        view_buffers
            .get(view.index())
            .and_then(Option::clone)
            .ok_or_else(|| out_of_bounds("buffer view", view.index()))
    };

    let mut attributes = Vec::new();
    let mut element_count = 0;
    let mut bounds = None;
    for (semantic, accessor) in primitive.attributes() {
        let Some(semantic) = semantic_from_gltf(&semantic) else {
            log::debug!("Ignoring unsupported vertex attribute {semantic:?}");
            continue;
        };
        let component_type = ComponentType::from_gl(accessor.data_type().as_gl_enum())
            .ok_or_else(|| View360Error::UnsupportedAsset("vertex component type".to_string()))?;
        let stride = accessor.view().and_then(|v| v.stride()).unwrap_or(0);

        attributes.push(
            PrimitiveAttribute::new(
                semantic,
                view_buffer(&accessor)?,
                accessor.dimensions().multiplicity() as u32,
                component_type,
                stride as u32,
                accessor.offset(),
            )
            .normalized(accessor.normalized()),
        );
        element_count = accessor.count() as u32;

        if semantic == AttributeSemantic::Position {
            let min = accessor.min().as_ref().and_then(json_vec3);
            let max = accessor.max().as_ref().and_then(json_vec3);
            bounds = min.zip(max);
        }
    }
    if attributes.is_empty() {
        log::warn!("Skipping primitive {} without supported attributes", primitive.index());
        return Ok(None);
    }

    let topology = Topology::from_gl(primitive.mode().as_gl_enum())
        .ok_or_else(|| View360Error::UnsupportedAsset("primitive mode".to_string()))?;
    let mut out = Primitive::new(attributes, element_count, topology);

    if let Some(accessor) = primitive.indices() {
        let index_type = IndexType::from_gl(accessor.data_type().as_gl_enum())
            .ok_or_else(|| View360Error::UnsupportedAsset("index component type".to_string()))?;
        out.set_indices(view_buffer(&accessor)?, index_type, accessor.offset());
        out.element_count = accessor.count() as u32;
    }
    if let Some((min, max)) = bounds {
        out.set_bounds(min, max);
    }
    Ok(Some(out))
}

/// Adds `node` and its subtree under `parent`. Returns the number of nodes
/// added.
fn add_node<C: GlContext>(
    node: &gltf::Node<'_>,
    parent: NodeHandle,
    meshes: &[Vec<RenderPrimitiveId>],
    renderer: &mut Renderer<C>,
    scene: &mut Scene,
) -> usize {
    let mut out = Node::new();
    out.name = node.name().map(str::to_string);
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            out.transform.set_matrix(Mat4::from_cols_array_2d(&matrix));
        }
        gltf::scene::Transform::Decomposed { translation, rotation, scale } => {
            out.transform.position = Vec3::from_array(translation);
            out.transform.rotation = Quat::from_array(rotation);
            out.transform.scale = Vec3::from_array(scale);
        }
    }
    let handle = scene.add_node(parent, out);

    if let Some(mesh) = node.mesh() {
        if let Some(ids) = meshes.get(mesh.index()) {
            for &id in ids {
                renderer.attach_render_primitive(scene, handle, id);
            }
        }
    }

    let mut count = 1;
    for child in node.children() {
        count += add_node(&child, handle, meshes, renderer, scene);
    }
    count
}
