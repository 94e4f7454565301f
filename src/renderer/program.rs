//! Linked shader programs.
//!
//! Compilation is issued eagerly when a [`Program`] is created, but its
//! result is only inspected on first use. Drivers that compile in the
//! background can then overlap linking with other work.

use rustc_hash::FxHashMap;

use super::gl::{GlContext, GlProgram, GlShader, ShaderStage, UniformLocation};
use crate::resources::ShaderDefines;

/// Work to run right after the program is next made current.
pub type ProgramInit = Box<dyn FnOnce(&Program, &mut dyn GlContext)>;

pub struct Program {
    handle: Option<GlProgram>,
    shaders: Vec<(ShaderStage, GlShader)>,
    uniforms: FxHashMap<String, UniformLocation>,
    defines: ShaderDefines,
    checked: bool,
    on_next_use: Vec<ProgramInit>,
}

impl Program {
    /// Compiles both stages with `defines` prepended and links them with
    /// the given attribute locations.
    pub(crate) fn new(
        gl: &mut dyn GlContext,
        vertex_source: &str,
        fragment_source: &str,
        attribute_locations: &[(&str, u32)],
        defines: ShaderDefines,
    ) -> Self {
        let preamble = defines.to_preamble();
        let program = gl.create_program();

        let mut shaders = Vec::with_capacity(2);
        for (stage, source) in [
            (ShaderStage::Vertex, vertex_source),
            (ShaderStage::Fragment, fragment_source),
        ] {
            let shader = gl.create_shader(stage);
            gl.shader_source(shader, &format!("{preamble}{source}"));
            gl.compile_shader(shader);
            gl.attach_shader(program, shader);
            shaders.push((stage, shader));
        }

        for &(name, location) in attribute_locations {
            gl.bind_attrib_location(program, location, name);
        }
        gl.link_program(program);

        Self {
            handle: Some(program),
            shaders,
            uniforms: FxHashMap::default(),
            defines,
            checked: false,
            on_next_use: Vec::new(),
        }
    }

    /// Queues work for the next time the program is made current.
    pub fn on_next_use(&mut self, init: ProgramInit) {
        self.on_next_use.push(init);
    }

    /// Makes the program current. Returns `false` if it failed to build.
    ///
    /// The first call checks the link status. A failed program is logged,
    /// deleted, and stays unusable from then on. A linked program has its
    /// active uniforms enumerated and its shader objects released.
    pub fn use_program(&mut self, gl: &mut dyn GlContext) -> bool {
        if !self.checked {
            self.checked = true;
            self.finish_link(gl);
        }

        let Some(handle) = self.handle else {
            return false;
        };
        gl.use_program(Some(handle));

        if !self.on_next_use.is_empty() {
            let pending = std::mem::take(&mut self.on_next_use);
            for init in pending {
                init(&*self, &mut *gl);
            }
        }
        true
    }

    fn finish_link(&mut self, gl: &mut dyn GlContext) {
        let Some(handle) = self.handle else {
            return;
        };

        if !gl.program_link_status(handle) {
            for &(stage, shader) in &self.shaders {
                if !gl.shader_compile_status(shader) {
                    log::error!(
                        "{} shader compile failed: {}",
                        stage.label(),
                        gl.shader_info_log(shader)
                    );
                }
            }
            log::error!("Program link failed: {}", gl.program_info_log(handle));
            gl.delete_program(handle);
            self.handle = None;
            self.on_next_use.clear();
        } else {
            for raw in gl.active_uniform_names(handle) {
                let name = raw.strip_suffix("[0]").unwrap_or(&raw);
                if let Some(location) = gl.uniform_location(handle, name) {
                    self.uniforms.insert(name.to_string(), location);
                }
            }
        }

        for (_, shader) in self.shaders.drain(..) {
            gl.delete_shader(shader);
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<GlProgram> {
        self.handle
    }

    /// `false` once a failed link has been observed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    /// Location of an active uniform. Array uniforms are looked up by their
    /// bare name.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    #[must_use]
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }
}
