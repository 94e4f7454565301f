//! Equirectangular skybox.

use std::f32::consts::PI;
use std::sync::Arc;

use glam::Vec3;

use crate::errors::Result;
use crate::renderer::Renderer;
use crate::renderer::gl::{BufferTarget, BufferUsage, ComponentType, GlContext, IndexType, Topology};
use crate::resources::material::{SKYBOX_SCALE_OFFSET, SKYBOX_TEXTURE};
use crate::resources::{AttributeSemantic, BufferSource, Material, Primitive, PrimitiveAttribute, Texture};
use crate::scene::{NodeHandle, Scene};

const LAT_SEGMENTS: u32 = 40;
const LON_SEGMENTS: u32 = 40;
/// POSITION (3 floats) + TEXCOORD_0 (2 floats).
const VERTEX_STRIDE: u32 = 20;

/// How the two eyes' images are packed into the panorama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoLayout {
    #[default]
    Mono,
    /// Left eye on top, right eye at the bottom.
    TopBottom,
    /// Left eye on the left half, right eye on the right half.
    LeftRight,
}

impl StereoLayout {
    /// Parses the display mode names used by viewer configuration
    /// (`mono`, `stereoTopBottom`, `stereoLeftRight`). Unknown names are mono.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "stereoTopBottom" => Self::TopBottom,
            "stereoLeftRight" => Self::LeftRight,
            _ => Self::Mono,
        }
    }

    /// Per-eye texture coordinate scale (xy) and offset (zw), left eye first.
    #[must_use]
    pub fn scale_offset(self) -> [f32; 8] {
        match self {
            Self::Mono => [1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
            Self::TopBottom => [1.0, 0.5, 0.0, 0.0, 1.0, 0.5, 0.0, 0.5],
            Self::LeftRight => [0.5, 1.0, 0.0, 0.0, 0.5, 1.0, 0.5, 0.0],
        }
    }
}

/// Unit lat/long sphere with interleaved position and texture coordinates.
///
/// The vertex shader pins the sphere to the far plane, so the radius does
/// not matter.
fn sphere_geometry(rotation_y: f32) -> (Vec<f32>, Vec<u16>) {
    let row = LON_SEGMENTS + 1;
    let mut vertices = Vec::with_capacity(((LAT_SEGMENTS + 1) * row * 5) as usize);
    let mut indices = Vec::with_capacity((LAT_SEGMENTS * LON_SEGMENTS * 6) as usize);

    for i in 0..=LAT_SEGMENTS {
        let theta = i as f32 * PI / LAT_SEGMENTS as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for j in 0..=LON_SEGMENTS {
            let phi = j as f32 * 2.0 * PI / LON_SEGMENTS as f32 + rotation_y;
            let (sin_phi, cos_phi) = phi.sin_cos();
            vertices.extend_from_slice(&[
                sin_phi * sin_theta,
                cos_theta,
                -cos_phi * sin_theta,
                j as f32 / LON_SEGMENTS as f32,
                i as f32 / LAT_SEGMENTS as f32,
            ]);

            if i < LAT_SEGMENTS && j < LON_SEGMENTS {
                let a = (i * row + j) as u16;
                let b = ((i + 1) * row + j) as u16;
                indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
            }
        }
    }
    (vertices, indices)
}

/// Adds a skybox node under `parent` textured with `texture`.
///
/// `rotation_y` (radians) turns the panorama around the vertical axis.
pub fn create_skybox<C: GlContext>(
    renderer: &mut Renderer<C>,
    scene: &mut Scene,
    parent: NodeHandle,
    texture: Arc<Texture>,
    layout: StereoLayout,
    rotation_y: f32,
) -> Result<NodeHandle> {
    let (vertices, indices) = sphere_geometry(rotation_y);

    let vertex_buffer = renderer.create_buffer(
        BufferTarget::Array,
        BufferSource::from_slice(&vertices),
        BufferUsage::Static,
    );
    let index_buffer = renderer.create_buffer(
        BufferTarget::ElementArray,
        BufferSource::from_slice(&indices),
        BufferUsage::Static,
    );

    let attributes = vec![
        PrimitiveAttribute::new(
            AttributeSemantic::Position,
            vertex_buffer.clone(),
            3,
            ComponentType::Float,
            VERTEX_STRIDE,
            0,
        ),
        PrimitiveAttribute::new(
            AttributeSemantic::TexCoord0,
            vertex_buffer,
            2,
            ComponentType::Float,
            VERTEX_STRIDE,
            12,
        ),
    ];
    let mut primitive = Primitive::new(attributes, indices.len() as u32, Topology::Triangles);
    primitive.set_indices(index_buffer, IndexType::UnsignedShort, 0);
    primitive.set_bounds(Vec3::NEG_ONE, Vec3::ONE);

    let mut material = Material::skybox();
    material.set_texture(SKYBOX_TEXTURE, Some(texture));
    material.set_uniform(SKYBOX_SCALE_OFFSET, &layout.scale_offset());

    let node = renderer.create_mesh(scene, parent, &primitive, &material)?;
    if let Some(n) = scene.get_mut(node) {
        n.name = Some("skybox".to_string());
    }
    log::debug!("Created skybox ({layout:?}, {} triangles)", indices.len() / 3);
    Ok(node)
}
