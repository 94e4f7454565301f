//! GPU-side material instances.

use super::gl::{GlContext, UniformLocation};
use super::program::Program;
use super::program_cache::{ProgramCache, ProgramId};
use super::texture_cache::{RenderTextureId, TextureCache};
use crate::errors::Result;
use crate::resources::{Material, MaterialState, RenderOrder};

/// Handle to a [`RenderMaterial`] owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderMaterialId(pub(crate) u32);

impl RenderMaterialId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct SamplerBinding {
    name: String,
    /// Texture unit; the sampler's declaration index in the material.
    unit: u32,
    texture: Option<RenderTextureId>,
}

#[derive(Debug, Clone)]
struct UniformBinding {
    name: String,
    length: u32,
    value: Vec<f32>,
    location: Option<UniformLocation>,
}

/// A material bound to a program, with textures resolved to the render
/// texture cache.
#[derive(Debug)]
pub struct RenderMaterial {
    program: ProgramId,
    state: MaterialState,
    render_order: RenderOrder,
    samplers: Vec<SamplerBinding>,
    uniforms: Vec<UniformBinding>,
    locations_resolved: bool,
    active_frame_id: u64,
    complete_for_active_frame: bool,
}

impl RenderMaterial {
    pub(crate) fn new(
        gl: &mut dyn GlContext,
        material: &Material,
        program_id: ProgramId,
        programs: &mut ProgramCache,
        textures: &mut TextureCache,
    ) -> Result<Self> {
        let mut samplers = Vec::with_capacity(material.samplers().len());
        for (unit, sampler) in material.samplers().iter().enumerate() {
            let texture = match &sampler.texture {
                Some(texture) => Some(textures.get_or_create(gl, texture)?),
                None => None,
            };
            samplers.push(SamplerBinding {
                name: sampler.name.clone(),
                unit: unit as u32,
                texture,
            });
        }

        let uniforms = material
            .uniforms()
            .iter()
            .map(|u| UniformBinding {
                name: u.name.clone(),
                length: u.length as u32,
                value: u.value.clone(),
                location: None,
            })
            .collect();

        // Sampler uniforms point at their units once the program is current.
        let units: Vec<(String, i32)> = samplers
            .iter()
            .map(|s| (s.name.clone(), s.unit as i32))
            .collect();
        if !units.is_empty() {
            programs.get_mut(program_id).on_next_use(Box::new(move |program, gl| {
                for (name, unit) in &units {
                    if let Some(location) = program.uniform(name) {
                        gl.uniform_1i(location, *unit);
                    }
                }
            }));
        }

        Ok(Self {
            program: program_id,
            state: material.state,
            render_order: material.render_order.resolve(material.state),
            samplers,
            uniforms,
            locations_resolved: false,
            active_frame_id: 0,
            complete_for_active_frame: false,
        })
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> MaterialState {
        self.state
    }

    /// Resolved draw bucket.
    #[inline]
    #[must_use]
    pub fn render_order(&self) -> RenderOrder {
        self.render_order
    }

    #[must_use]
    pub fn sampler_names(&self) -> Vec<&str> {
        self.samplers.iter().map(|s| s.name.as_str()).collect()
    }

    #[must_use]
    pub fn uniform_value(&self, name: &str) -> Option<&[f32]> {
        self.uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.value.as_slice())
    }

    pub(crate) fn set_uniform(&mut self, name: &str, value: &[f32]) -> bool {
        match self.uniforms.iter_mut().find(|u| u.name == name) {
            Some(uniform) => {
                uniform.value.clear();
                uniform.value.extend_from_slice(value);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_texture(&mut self, name: &str, texture: Option<RenderTextureId>) -> bool {
        match self.samplers.iter_mut().find(|s| s.name == name) {
            Some(sampler) => {
                sampler.texture = texture;
                // Force re-evaluation this frame.
                self.active_frame_id = 0;
                true
            }
            None => false,
        }
    }

    /// Once per frame: activates referenced textures and reports whether
    /// every assigned texture has been uploaded.
    pub(crate) fn mark_active(
        &mut self,
        frame_id: u64,
        textures: &mut TextureCache,
        gl: &mut dyn GlContext,
    ) -> bool {
        if self.active_frame_id != frame_id {
            self.active_frame_id = frame_id;
            self.complete_for_active_frame = true;
            for sampler in &self.samplers {
                if let Some(texture) = sampler.texture {
                    if !textures.mark_active(texture, frame_id, gl) {
                        self.complete_for_active_frame = false;
                    }
                }
            }
        }
        self.complete_for_active_frame
    }

    /// Binds textures and uploads uniform values for `program`, which must
    /// be current.
    ///
    /// The first bind drops slots the program does not use.
    pub(crate) fn bind(&mut self, gl: &mut dyn GlContext, program: &Program, textures: &TextureCache) {
        if !self.locations_resolved {
            self.locations_resolved = true;
            self.samplers.retain(|s| program.uniform(&s.name).is_some());
            self.uniforms.retain_mut(|u| {
                u.location = program.uniform(&u.name);
                u.location.is_some()
            });
        }

        for sampler in &self.samplers {
            gl.active_texture(sampler.unit);
            let handle = sampler
                .texture
                .map(|id| textures.get(id))
                .filter(|t| t.is_complete())
                .map(super::texture_cache::RenderTexture::handle);
            gl.bind_texture(handle);
        }

        for uniform in &self.uniforms {
            if let Some(location) = uniform.location {
                gl.uniform_fv(location, uniform.length, &uniform.value);
            }
        }
    }
}
