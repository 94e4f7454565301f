//! Materials: shader choice, sampler and uniform slots, and fixed-function
//! state.
//!
//! A [`Material`] is a CPU-side description. When a primitive is handed to
//! the renderer, the material is resolved to a program (by material name and
//! define set) and its slots are copied into a render material, which from
//! then on is mutated through the renderer.

use std::sync::Arc;

use uuid::Uuid;

use super::material_state::{DepthFunc, MaterialState, RenderOrder};
use super::primitive::AttributeMask;
use super::shader_defines::ShaderDefines;
use super::texture::Texture;
use crate::errors::{Result, View360Error};

const STANDARD_VERTEX: &str = include_str!("shaders/standard.vert.glsl");
const STANDARD_FRAGMENT: &str = include_str!("shaders/standard.frag.glsl");
const SKYBOX_VERTEX: &str = include_str!("shaders/skybox.vert.glsl");
const SKYBOX_FRAGMENT: &str = include_str!("shaders/skybox.frag.glsl");

/// Sampler slot of the standard material.
pub const BASE_COLOR_TEXTURE: &str = "baseColorTex";
/// Uniform slot of the standard material.
pub const BASE_COLOR_FACTOR: &str = "baseColorFactor";
/// Sampler slot of the skybox material.
pub const SKYBOX_TEXTURE: &str = "diffuse";
/// Per-eye texture coordinate transform of the skybox material.
pub const SKYBOX_SCALE_OFFSET: &str = "texCoordScaleOffset";

#[derive(Debug, Clone)]
pub struct MaterialSampler {
    pub name: String,
    pub texture: Option<Arc<Texture>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialUniform {
    pub name: String,
    /// Components per element (1-4); `value.len()` is a multiple of it.
    pub length: usize,
    pub value: Vec<f32>,
}

/// Shader source supplied by the application.
#[derive(Debug, Clone, Default)]
pub struct CustomShader {
    pub name: String,
    /// Body defining `vec4 vertex_main(mat4 proj, mat4 view, mat4 model)`.
    pub vertex_source: String,
    /// Body defining `vec4 fragment_main()`.
    pub fragment_source: String,
    pub defines: ShaderDefines,
}

#[derive(Debug, Clone)]
pub enum MaterialKind {
    /// Base color factor and texture, optional vertex color, simple
    /// directional lighting when normals are present.
    Standard,
    /// Equirectangular sky sphere with per-eye texture coordinates.
    Skybox,
    Custom(CustomShader),
}

/// Render materials are shared by material identity, so a clone is a new
/// material with a fresh uuid.
#[derive(Debug)]
pub struct Material {
    uuid: Uuid,
    kind: MaterialKind,
    pub state: MaterialState,
    pub render_order: RenderOrder,
    samplers: Vec<MaterialSampler>,
    uniforms: Vec<MaterialUniform>,
}

impl Clone for Material {
    fn clone(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: self.kind.clone(),
            state: self.state,
            render_order: self.render_order,
            samplers: self.samplers.clone(),
            uniforms: self.uniforms.clone(),
        }
    }
}

impl Material {
    #[must_use]
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
            state: MaterialState::default(),
            render_order: RenderOrder::Default,
            samplers: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    /// The glTF-style material: `baseColorTex` sampler and a
    /// `baseColorFactor` uniform defaulting to opaque white.
    #[must_use]
    pub fn standard() -> Self {
        let mut material = Self::new(MaterialKind::Standard);
        material.define_sampler(BASE_COLOR_TEXTURE);
        material.define_uniform(BASE_COLOR_FACTOR, &[1.0, 1.0, 1.0, 1.0], 4);
        material
    }

    #[must_use]
    pub fn skybox() -> Self {
        let mut material = Self::new(MaterialKind::Skybox);
        material.render_order = RenderOrder::Sky;
        material.state.set_depth_func(DepthFunc::LessEqual);
        material.state.set_depth_mask(false);
        material.define_sampler(SKYBOX_TEXTURE);
        material.define_uniform(
            SKYBOX_SCALE_OFFSET,
            &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
            4,
        );
        material
    }

    #[must_use]
    pub fn custom(shader: CustomShader) -> Self {
        Self::new(MaterialKind::Custom(shader))
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    // ─── Slots ────────────────────────────────────────────────────────

    /// Declares a sampler slot. Slot order is the texture unit order.
    pub fn define_sampler(&mut self, name: &str) {
        if self.sampler(name).is_none() {
            self.samplers.push(MaterialSampler {
                name: name.to_string(),
                texture: None,
            });
        }
    }

    /// Declares a uniform slot of `length` components per element.
    pub fn define_uniform(&mut self, name: &str, default: &[f32], length: usize) {
        let uniform = MaterialUniform {
            name: name.to_string(),
            length: length.clamp(1, 4),
            value: default.to_vec(),
        };
        match self.uniforms.iter_mut().find(|u| u.name == name) {
            Some(existing) => *existing = uniform,
            None => self.uniforms.push(uniform),
        }
    }

    /// Returns `false` if no sampler slot of that name exists.
    pub fn set_texture(&mut self, name: &str, texture: Option<Arc<Texture>>) -> bool {
        match self.samplers.iter_mut().find(|s| s.name == name) {
            Some(sampler) => {
                sampler.texture = texture;
                true
            }
            None => false,
        }
    }

    /// Returns `false` if no uniform slot of that name exists.
    pub fn set_uniform(&mut self, name: &str, value: &[f32]) -> bool {
        match self.uniforms.iter_mut().find(|u| u.name == name) {
            Some(uniform) => {
                uniform.value.clear();
                uniform.value.extend_from_slice(value);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn sampler(&self, name: &str) -> Option<&MaterialSampler> {
        self.samplers.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&MaterialUniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    #[must_use]
    pub fn samplers(&self) -> &[MaterialSampler] {
        &self.samplers
    }

    #[must_use]
    pub fn uniforms(&self) -> &[MaterialUniform] {
        &self.uniforms
    }

    // ─── Program selection ────────────────────────────────────────────

    #[must_use]
    pub fn material_name(&self) -> &str {
        match &self.kind {
            MaterialKind::Standard => "STANDARD",
            MaterialKind::Skybox => "SKYBOX",
            MaterialKind::Custom(shader) => &shader.name,
        }
    }

    #[must_use]
    pub fn vertex_source(&self) -> &str {
        match &self.kind {
            MaterialKind::Standard => STANDARD_VERTEX,
            MaterialKind::Skybox => SKYBOX_VERTEX,
            MaterialKind::Custom(shader) => &shader.vertex_source,
        }
    }

    #[must_use]
    pub fn fragment_source(&self) -> &str {
        match &self.kind {
            MaterialKind::Standard => STANDARD_FRAGMENT,
            MaterialKind::Skybox => SKYBOX_FRAGMENT,
            MaterialKind::Custom(shader) => &shader.fragment_source,
        }
    }

    /// Checks that the material can be turned into a program.
    pub fn validate(&self) -> Result<()> {
        let name = self.material_name();
        if name.is_empty() {
            return Err(View360Error::MissingMaterialName);
        }
        if self.vertex_source().trim().is_empty() {
            return Err(View360Error::MissingShaderSource {
                material: name.to_string(),
                stage: "vertex",
            });
        }
        if self.fragment_source().trim().is_empty() {
            return Err(View360Error::MissingShaderSource {
                material: name.to_string(),
                stage: "fragment",
            });
        }
        Ok(())
    }

    /// The define set selecting this material's shader variant for a
    /// primitive providing `attributes`.
    #[must_use]
    pub fn program_defines(&self, attributes: AttributeMask) -> ShaderDefines {
        let mut defines = ShaderDefines::new();
        match &self.kind {
            MaterialKind::Standard => {
                if attributes.contains(AttributeMask::COLOR_0) {
                    defines.set("USE_VERTEX_COLOR", "1");
                }
                if attributes.contains(AttributeMask::NORMAL) {
                    defines.set("USE_NORMALS", "1");
                }
                let has_map = self
                    .sampler(BASE_COLOR_TEXTURE)
                    .is_some_and(|s| s.texture.is_some());
                if has_map && attributes.contains(AttributeMask::TEXCOORD_0) {
                    defines.set("USE_BASE_COLOR_MAP", "1");
                }
            }
            MaterialKind::Skybox => {}
            MaterialKind::Custom(shader) => defines.merge(&shader.defines),
        }
        defines
    }
}
